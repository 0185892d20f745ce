//! Operator console on standard input

use super::OperatorConsole;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};

pub struct StdinConsole {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinConsole {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(io::stdin()).lines(),
        }
    }
}

impl Default for StdinConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorConsole for StdinConsole {
    async fn read_line(&mut self) -> Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .context("Failed to read operator input")
    }
}
