//! Saved macro commands - list, show and delete

use mus::config::Config;
use mus::output::{OperationResult, OutputMode};
use mus::store::TemplateStore;

fn store() -> anyhow::Result<TemplateStore> {
    Ok(TemplateStore::new(Config::load()?.macro_dir))
}

/// List saved macros with the start of their text
pub fn list(output_mode: OutputMode) -> anyhow::Result<()> {
    let saved = store()?.list()?;

    if output_mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
        return Ok(());
    }

    if saved.is_empty() {
        println!("No saved macros.");
        return Ok(());
    }
    let width = saved.keys().map(String::len).max().unwrap_or(0);
    for (name, peek) in &saved {
        println!("{name:<width$}  {peek}");
    }
    Ok(())
}

/// Print a saved macro
pub fn show(name: &str, output_mode: OutputMode) -> anyhow::Result<()> {
    let raw = store()?.load(name)?;
    if output_mode == OutputMode::Json {
        let json = serde_json::json!({ "name": name, "macro": raw });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{raw}");
    }
    Ok(())
}

/// Delete a saved macro
pub fn delete(name: &str, output_mode: OutputMode) -> anyhow::Result<()> {
    let deleted = store()?.delete(name)?;
    let message = if deleted {
        format!("Deleted macro '{name}'")
    } else {
        format!("No saved macro named '{name}'")
    };
    OperationResult {
        success: deleted,
        message,
    }
    .render(output_mode);
    Ok(())
}
