//! Terminal confirmation for repository initialization.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use snapkeep_git::InitPrompt;

/// Asks on the terminal before creating a repository.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl InitPrompt for TerminalPrompt {
    async fn confirm_init(&self, workspace: &Path) -> bool {
        let question = format!(
            "{} is not a git repository. Initialize one? (yes/no): ",
            workspace.display()
        );
        tokio::task::spawn_blocking(move || ask(&question))
            .await
            .unwrap_or(false)
    }
}

fn ask(question: &str) -> bool {
    print!("{question}");
    if std::io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match std::io::stdin().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
