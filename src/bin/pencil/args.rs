use anyhow::{Result, anyhow};
use std::env;

use pencil_ai::Mode;

#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub prompt: Option<String>,       // -p/--prompt
    pub file: Option<String>,         // -f/--file
    pub model: Option<String>,        // -m/--model
    pub provider: Option<String>,     // --provider
    pub mode: Mode,                   // --mode
    pub conversation: Option<String>, // --conversation
    pub quiet: bool,                  // -q/--quiet
    pub json_output: bool,            // --json
}

impl CliArgs {
    pub fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        Self::parse_from(&args[1..])
    }

    pub fn parse_from(args: &[String]) -> Result<Self> {
        let mut result = CliArgs::default();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = || {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{arg} requires a value"))
            };

            match arg.as_str() {
                "-p" | "--prompt" => result.prompt = Some(value()?),
                "-f" | "--file" => result.file = Some(value()?),
                "-m" | "--model" => result.model = Some(value()?),
                "--provider" => result.provider = Some(value()?),
                "--mode" => result.mode = value()?.parse().map_err(|e: String| anyhow!(e))?,
                "--conversation" => result.conversation = Some(value()?),
                "-q" | "--quiet" => result.quiet = true,
                "--json" => result.json_output = true,
                unknown => return Err(anyhow!("Unknown argument: {unknown}")),
            }
        }

        if result.prompt.is_some() && result.file.is_some() {
            return Err(anyhow!("--prompt and --file are mutually exclusive"));
        }
        Ok(result)
    }

    /// One-shot mode: a prompt was given on the command line.
    pub fn is_scriptable(&self) -> bool {
        self.prompt.is_some() || self.file.is_some()
    }

    pub fn get_prompt(&self) -> Result<Option<String>> {
        if let Some(ref file_path) = self.file {
            let content = std::fs::read_to_string(file_path)
                .map_err(|e| anyhow!("Failed to read file {file_path}: {e}"))?;
            Ok(Some(content.trim().to_string()))
        } else {
            Ok(self.prompt.clone())
        }
    }
}
