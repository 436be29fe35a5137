use crate::models::RunResult;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Output handler for run results
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "console" => OutputFormat::Console,
            _ => OutputFormat::Jsonl, // Default
        })
    }
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new(
        format: OutputFormat,
        file_path: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let writer: Option<Box<dyn Write + Send>> = match (&format, file_path) {
            (OutputFormat::Console, _) => None,
            (_, Some(path)) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            (_, None) => None,
        };

        Ok(OutputHandler { format, writer })
    }

    /// Write a run result
    pub fn write_result(&mut self, result: &RunResult) -> Result<(), Box<dyn std::error::Error>> {
        match &self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(result)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Jsonl => {
                let json = serde_json::to_string(result)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Console => {
                let mut output = format!(
                    "[{}] detected: {}, {} alert(s), {} event(s)\n",
                    result.run_id,
                    result.detected,
                    result.alerts.len(),
                    result.event_sequence.len()
                );
                for alert in &result.alerts {
                    output.push_str(&format!(
                        "  {} ({:?}): {}\n",
                        alert.rule_triggered,
                        alert.severity,
                        serde_json::to_string(&alert.evidence)?
                    ));
                }
                self.write_output(&output)?;
            }
        }
        Ok(())
    }

    fn write_output(&mut self, data: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", data);
                std::io::stdout().flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_result() -> RunResult {
        RunResult {
            run_id: "run_test".to_string(),
            detected: false,
            alerts: vec![],
            event_sequence: vec![],
        }
    }

    #[test]
    fn test_jsonl_output_is_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let mut handler = OutputHandler::new(OutputFormat::Jsonl, Some(path.clone())).unwrap();
        handler.write_result(&sample_result()).unwrap();
        handler.write_result(&sample_result()).unwrap();
        handler.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let parsed: RunResult = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.run_id, "run_test");
    }

    #[test]
    fn test_format_from_str() {
        assert!(matches!("json".parse().unwrap(), OutputFormat::Json));
        assert!(matches!("CONSOLE".parse().unwrap(), OutputFormat::Console));
        assert!(matches!("anything".parse().unwrap(), OutputFormat::Jsonl));
    }
}
