//! Concat demo
//!
//! Declares a content-concatenation execution type and runs it three
//! ways: with a separator override, with a timeout shorter than the work,
//! and with inputs ignored.
//!
//! Run with `cargo run --example concat`.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::Level;

use execution_core::{
    logging, Definition, Extension, OptionDescriptor, OptionSchema, Options, Result, RunSettings,
};

fn concat(delay_ms: u64) -> Extension {
    let separator = if cfg!(windows) { "\r\n" } else { "\n" };
    Extension::define(
        Definition::new("Concat")
            .options(OptionSchema::new().describe(
                "separator",
                OptionDescriptor::new()
                    .default_value(separator)
                    .kind("string")
                    .label("separator string")
                    .placeholder("concatenated input will be joined on this string"),
            ))
            .execute(move |ctx, completion| async move {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                let separator = ctx.option_str("separator").unwrap_or("\n");
                let contents = ctx
                    .inputs()
                    .iter()
                    .filter_map(|record| record["contents"].as_str())
                    .collect::<Vec<_>>()
                    .join(separator);
                completion.resolve(json!({ "contents": contents }));
                Ok(())
            }),
    )
}

fn files() -> Value {
    json!([
        {"contents": "file1"},
        {"contents": "file2"},
        {"contents": "file3"}
    ])
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_simple(Level::INFO)?;

    let mut plus = Options::new();
    plus.insert("separator".to_string(), json!("+"));
    let joined = concat(0).instantiate().run(files(), Some(plus)).await?;
    println!("joined:  {}", joined["contents"]);

    match concat(200)
        .instantiate()
        .run_with(files(), None, None, RunSettings::timeout(100))
        .await
    {
        Ok(value) => println!("slow:    {}", value["contents"]),
        Err(err) => println!("slow:    {}", err),
    }

    let ignored = concat(0)
        .instantiate()
        .run_with(files(), None, None, RunSettings::ignore(true))
        .await?;
    println!("ignored: {}", ignored["contents"]);

    Ok(())
}
