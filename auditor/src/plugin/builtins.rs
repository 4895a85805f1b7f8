//! Plugins compiled into the binary.

use anyhow::Result;
use tracing::warn;

use crate::context::{Context, Flags};
use crate::error::is_audit_error;
use crate::io::config::{Config, render_config};
use crate::io::git::GitOptions;
use crate::messages;
use crate::plugin::{Action, Plugin, PluginBase, Registry, Run};

/// Register every built-in plugin.
pub fn register_builtins(registry: &mut Registry) -> Result<()> {
    registry.register("audit", Plugin::Action(Box::new(AuditAll)))?;
    registry.register("clean", Plugin::Action(Box::new(Clean)))?;
    registry.register("generate-rcfile", Plugin::Action(Box::new(GenerateRcfile)))?;
    registry.register("modules", Plugin::Action(Box::new(Modules)))?;
    Ok(())
}

/// Runs the configured plugins in order and summarizes the results.
#[derive(Debug)]
pub struct AuditAll;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Passed,
    Failed,
    Skipped,
}

impl Mark {
    fn symbol(self) -> &'static str {
        match self {
            Self::Passed => "✓",
            Self::Failed => "✖",
            Self::Skipped => "-",
        }
    }
}

impl PluginBase for AuditAll {
    fn about(&self) -> &str {
        "Run the plugins listed under [audit] in the config file."
    }
}

impl Action for AuditAll {
    fn action(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32> {
        let mut queue = ctx.config.audit.plugins.clone();
        if run.flags.clean {
            queue.insert(0, "clean".to_string());
        }
        let fail_fast = ctx.config.audit.fail_fast;
        // Members must not repeat the clean step.
        let flags = Flags {
            clean: false,
            ..run.flags
        };

        ctx.console.out(messages::banner(run.name));
        ctx.console.out(messages::AUDIT_RUNNING);
        for name in &queue {
            ctx.console.out(format!("- {name}"));
        }

        let mut results = Vec::with_capacity(queue.len());
        for name in &queue {
            if !run.registry().contains(name) {
                warn!(plugin = %name, "configured plugin is not registered, skipping");
                results.push((name, Mark::Skipped));
                continue;
            }
            ctx.console.out(messages::banner(name));
            let mark = match run.invoke_with(ctx, name, flags) {
                Ok(0) => Mark::Passed,
                Ok(_) => Mark::Failed,
                Err(err) if is_audit_error(&err) => {
                    ctx.console.err(format!("{err:#}"));
                    Mark::Failed
                }
                Err(err) => return Err(err),
            };
            results.push((name, mark));
            if mark == Mark::Failed && fail_fast {
                break;
            }
        }

        let failed = results.iter().any(|(_, mark)| *mark == Mark::Failed);
        ctx.console.out("");
        ctx.console.out(if failed {
            messages::AUDIT_FAILED
        } else {
            messages::AUDIT_PASSED
        });
        for (name, mark) in &results {
            ctx.console.out(format!("- {name} {}", mark.symbol()));
        }
        Ok(i32::from(failed))
    }
}

/// Lists registered plugins.
#[derive(Debug)]
pub struct Modules;

impl PluginBase for Modules {
    fn about(&self) -> &str {
        "List all registered plugins with their descriptions."
    }
}

impl Action for Modules {
    fn action(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32> {
        ctx.console.out(render_modules(run.registry()));
        Ok(0)
    }
}

/// One aligned `name  description` line per plugin.
pub fn render_modules(registry: &Registry) -> String {
    let width = registry
        .registered()
        .iter()
        .map(|name| name.len())
        .max()
        .unwrap_or_default();
    let mut out = String::from("available plugins:");
    for (name, entry) in registry.mapping() {
        let about = entry.about();
        if about.is_empty() {
            out.push_str(&format!("\n  {name}"));
        } else {
            out.push_str(&format!("\n  {name:<width$}  {about}"));
        }
    }
    out
}

/// Removes untracked and ignored files with `git clean -fdx`.
#[derive(Debug)]
pub struct Clean;

impl PluginBase for Clean {
    fn about(&self) -> &str {
        "Remove untracked and ignored files, keeping [clean] excludes."
    }
}

impl Action for Clean {
    fn action(&self, ctx: &mut Context, _run: &Run<'_>) -> Result<i32> {
        let mut args = vec!["clean".to_string(), "-fdx".to_string()];
        let cache_dir = ctx.config.cache.dir.to_string_lossy().into_owned();
        for pattern in ctx.config.clean.exclude.iter().chain(std::iter::once(&cache_dir)) {
            args.push("-e".to_string());
            args.push(pattern.clone());
        }
        let output = ctx.vcs().run(&args, GitOptions::default())?;
        Ok(output.code)
    }
}

/// Prints the default configuration file.
#[derive(Debug)]
pub struct GenerateRcfile;

impl PluginBase for GenerateRcfile {
    fn about(&self) -> &str {
        "Print the default configuration as TOML."
    }
}

impl Action for GenerateRcfile {
    fn action(&self, ctx: &mut Context, _run: &Run<'_>) -> Result<i32> {
        let rendered = render_config(&Config::default())?;
        ctx.console.out(rendered.trim_end());
        Ok(0)
    }
}
