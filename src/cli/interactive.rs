//! Configuração interativa do Presage (dialoguer).

use std::path::{Path, PathBuf};

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::types::config::{Config, DetectionMethod, EngineKind, SourceConfig};
use crate::PresageResult;

/// Executa a configuração interativa.
pub fn run_interactive_config(config_path: &Path) -> PresageResult<()> {
    let theme = ColorfulTheme::default();

    println!("\nPresage interactive configuration\n");

    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        println!("Creating a new configuration...\n");
        Config::default_config()
    };

    let options = [
        "General",
        "Storage",
        "Pattern learning",
        "Detection and forecasting",
        "Numeric engine",
        "Data sources",
        "Save and exit",
        "Exit without saving",
    ];

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("What do you want to configure?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => configure_general(&theme, &mut config)?,
            1 => configure_storage(&theme, &mut config)?,
            2 => configure_learning(&theme, &mut config)?,
            3 => configure_analysis(&theme, &mut config)?,
            4 => configure_engine(&theme, &mut config)?,
            5 => configure_sources(&theme, &mut config)?,
            6 => {
                config.save(config_path)?;
                println!("\nConfiguration saved to: {}\n", config_path.display());
                break;
            }
            _ => {
                if Confirm::with_theme(&theme)
                    .with_prompt("Discard changes?")
                    .default(false)
                    .interact()?
                {
                    println!("\nLeaving without saving.\n");
                    break;
                }
            }
        }
    }

    Ok(())
}

fn select_str(theme: &ColorfulTheme, prompt: &str, items: &[&str], current: &str) -> PresageResult<String> {
    let default = items.iter().position(|&i| i == current).unwrap_or(0);
    let idx = Select::with_theme(theme)
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact()?;
    Ok(items[idx].to_string())
}

fn input_confidence(theme: &ColorfulTheme, prompt: &str, current: f64) -> PresageResult<f64> {
    let value: f64 = Input::with_theme(theme)
        .with_prompt(prompt)
        .default(current)
        .validate_with(|v: &f64| {
            if (0.0..=1.0).contains(v) {
                Ok(())
            } else {
                Err("must be between 0 and 1")
            }
        })
        .interact_text()?;
    Ok(value)
}

fn configure_general(theme: &ColorfulTheme, config: &mut Config) -> PresageResult<()> {
    config.general.log_level = select_str(
        theme,
        "Log level",
        &["error", "warn", "info", "debug", "trace"],
        &config.general.log_level,
    )?;
    config.general.log_format =
        select_str(theme, "Log format", &["text", "json"], &config.general.log_format)?;
    config.general.timeout_secs = Input::with_theme(theme)
        .with_prompt("Repository fetch timeout (seconds)")
        .default(config.general.timeout_secs)
        .interact_text()?;
    Ok(())
}

fn configure_storage(theme: &ColorfulTheme, config: &mut Config) -> PresageResult<()> {
    let db_path: String = Input::with_theme(theme)
        .with_prompt("Database path")
        .default(config.storage.db_path.display().to_string())
        .interact_text()?;
    config.storage.db_path = PathBuf::from(db_path);
    Ok(())
}

fn configure_learning(theme: &ColorfulTheme, config: &mut Config) -> PresageResult<()> {
    let learning = &mut config.learning;

    learning.enabled = Confirm::with_theme(theme)
        .with_prompt("Learning sink enabled?")
        .default(learning.enabled)
        .interact()?;

    learning.default_confidence =
        input_confidence(theme, "Initial confidence", learning.default_confidence)?;
    learning.reinforcement_step =
        input_confidence(theme, "Reinforcement step", learning.reinforcement_step)?;
    learning.max_confidence = input_confidence(theme, "Confidence ceiling", learning.max_confidence)?;
    learning.min_confidence =
        input_confidence(theme, "High-confidence threshold", learning.min_confidence)?;

    learning.reinforce_on_insight = Confirm::with_theme(theme)
        .with_prompt("Reinforce patterns from recorded insights?")
        .default(learning.reinforce_on_insight)
        .interact()?;
    Ok(())
}

fn configure_analysis(theme: &ColorfulTheme, config: &mut Config) -> PresageResult<()> {
    let analysis = &mut config.analysis;

    analysis.window_limit = Input::with_theme(theme)
        .with_prompt("Observations per window")
        .default(analysis.window_limit)
        .interact_text()?;
    analysis.min_samples = Input::with_theme(theme)
        .with_prompt("Minimum samples")
        .default(analysis.min_samples)
        .interact_text()?;

    let methods = ["robust_z", "iqr"];
    let current = match analysis.method {
        DetectionMethod::RobustZ => 0,
        DetectionMethod::Iqr => 1,
    };
    let idx = Select::with_theme(theme)
        .with_prompt("Detection method")
        .items(&methods)
        .default(current)
        .interact()?;
    analysis.method = if idx == 0 {
        DetectionMethod::RobustZ
    } else {
        DetectionMethod::Iqr
    };

    analysis.warning_threshold = Input::with_theme(theme)
        .with_prompt("Warning threshold")
        .default(analysis.warning_threshold)
        .interact_text()?;
    let critical: f64 = Input::with_theme(theme)
        .with_prompt("Critical threshold")
        .default(analysis.critical_threshold)
        .interact_text()?;
    analysis.critical_threshold = critical.max(analysis.warning_threshold);

    analysis.interval_hours = Input::with_theme(theme)
        .with_prompt("Forecast interval (hours)")
        .default(analysis.interval_hours)
        .interact_text()?;
    Ok(())
}

fn configure_engine(theme: &ColorfulTheme, config: &mut Config) -> PresageResult<()> {
    let engine = &mut config.engine;

    let external = Confirm::with_theme(theme)
        .with_prompt("Use an external numeric runtime?")
        .default(engine.kind == EngineKind::External)
        .interact()?;
    engine.kind = if external {
        EngineKind::External
    } else {
        EngineKind::InProcess
    };

    if external {
        engine.command = Input::with_theme(theme)
            .with_prompt("Command")
            .default(engine.command.clone())
            .interact_text()?;
        let args: String = Input::with_theme(theme)
            .with_prompt("Arguments (space separated)")
            .default(engine.args.join(" "))
            .allow_empty(true)
            .interact_text()?;
        engine.args = args.split_whitespace().map(String::from).collect();
    }

    engine.timeout_secs = Input::with_theme(theme)
        .with_prompt("Engine timeout (seconds)")
        .default(engine.timeout_secs)
        .interact_text()?;
    Ok(())
}

fn configure_sources(theme: &ColorfulTheme, config: &mut Config) -> PresageResult<()> {
    loop {
        let mut items: Vec<String> = config
            .sources
            .iter()
            .map(|(name, source)| format!("{} ({})", name, source.metric.as_deref().unwrap_or("-")))
            .collect();
        items.push("Add source".to_string());
        items.push("Back".to_string());

        let idx = Select::with_theme(theme)
            .with_prompt("Data sources")
            .items(&items)
            .default(0)
            .interact()?;

        let existing = config.sources.len();
        if idx == existing + 1 {
            return Ok(());
        }

        let name = if idx == existing {
            Input::<String>::with_theme(theme)
                .with_prompt("Source name")
                .interact_text()?
        } else {
            match config.sources.keys().nth(idx) {
                Some(name) => name.clone(),
                None => continue,
            }
        };

        let current = config
            .sources
            .get(&name)
            .and_then(|s| s.metric.clone())
            .unwrap_or_default();
        let metric: String = Input::with_theme(theme)
            .with_prompt("Metric field (empty for none)")
            .default(current)
            .allow_empty(true)
            .interact_text()?;

        let metric = metric.trim();
        config.sources.insert(
            name,
            if metric.is_empty() {
                SourceConfig::default()
            } else {
                SourceConfig::with_metric(metric)
            },
        );
    }
}

/// Mostra resumo da configuração.
pub fn show_config_summary(config: &Config) {
    println!("\nConfiguration summary\n");
    println!("  [general]  log {} ({}), fetch timeout {}s",
        config.general.log_level, config.general.log_format, config.general.timeout_secs);
    println!("  [storage]  {}", config.storage.db_path.display());
    println!(
        "  [learning] {} | initial {:.2}, step {:.2}, ceiling {:.2}, threshold {:.2}",
        if config.learning.enabled { "enabled" } else { "disabled" },
        config.learning.default_confidence,
        config.learning.reinforcement_step,
        config.learning.max_confidence,
        config.learning.min_confidence
    );
    println!(
        "  [analysis] {:?}, window {}, min samples {}, thresholds {}/{}",
        config.analysis.method,
        config.analysis.window_limit,
        config.analysis.min_samples,
        config.analysis.warning_threshold,
        config.analysis.critical_threshold
    );
    match config.engine.kind {
        EngineKind::InProcess => println!("  [engine]   in process, timeout {}s", config.engine.timeout_secs),
        EngineKind::External => println!(
            "  [engine]   external: {} {}, timeout {}s",
            config.engine.command,
            config.engine.args.join(" "),
            config.engine.timeout_secs
        ),
    }
    for (name, source) in &config.sources {
        println!("  [sources.{}] metric {}", name, source.metric.as_deref().unwrap_or("-"));
    }
    println!();
}
