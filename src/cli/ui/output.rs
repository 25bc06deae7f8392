use console::style;

use crate::generation::{GeneratedArtifact, ProgressEvent};

/// Styled terminal output for generation runs
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new() -> Self {
        Self { json: false }
    }

    /// One JSON object per line instead of styled text
    pub fn json_lines() -> Self {
        Self { json: true }
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn event(&self, event: &ProgressEvent) -> crate::types::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }

        match event {
            ProgressEvent::Status { stage, message } => {
                println!("{} {}", style(format!("[{}]", stage)).dim(), message)
            }
            ProgressEvent::Warning { message } => self.warning(message),
            ProgressEvent::Error { kind, message } => {
                self.error(&format!("{} ({})", message, style(kind).dim()))
            }
            ProgressEvent::Artifact { artifact } => self.artifact(artifact),
            ProgressEvent::Done { duration_ms } => {
                self.success(&format!("Done in {:.1}s", *duration_ms as f64 / 1000.0))
            }
        }
        Ok(())
    }

    fn artifact(&self, artifact: &GeneratedArtifact) {
        let content = &artifact.content;
        self.section(&content.title);
        println!("{}\n", content.question);
        println!("{} {}", style("Answer:").bold(), content.correct_answer);
        println!("{} {}", style("Why:").bold(), content.explanation);
        for (i, hint) in content.hints.iter().enumerate() {
            println!("{} {}", style(format!("Hint {}:", i + 1)).dim(), hint);
        }
        println!(
            "{} {:.1}  {} {} min  {} {}",
            style("Difficulty:").dim(),
            content.difficulty,
            style("Time:").dim(),
            content.estimated_time_minutes,
            style("Tags:").dim(),
            content.tags.join(", ")
        );
        println!(
            "{} {} ({} in / {} out tokens, ${:.5})",
            style("Model:").dim(),
            artifact.backend_id,
            artifact.usage.input_tokens,
            artifact.usage.output_tokens,
            artifact.cost
        );

        if content.auto_corrected {
            self.info("Answer was corrected to match the puzzle data");
        }
        match &artifact.id {
            Some(id) => self.info(&format!("Saved as {}", id)),
            None => self.warning("Not saved"),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
