use crate::kit::error::Result;
use async_trait::async_trait;

/// Trait for the external collaborators the coordinator drives.
///
/// Every collaborator speaks a single textual command interface: a command
/// or query string in, a JSON (or plain status) string out.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (used in logs and error messages)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Execute the tool with the given command and return its raw output
    async fn run(&self, command: &str) -> Result<String>;
}
