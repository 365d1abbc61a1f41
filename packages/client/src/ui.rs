//! UI utilities for the client.

use std::io::Write;

/// Print `text` and redisplay the prompt below it.
pub fn print_above_prompt(text: &str, viewer_name: &str) {
    print!("\r{text}{viewer_name}> ");
    std::io::stdout().flush().ok();
}
