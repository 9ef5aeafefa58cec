//! `relaybot check-links` — parse channel links offline.

use anyhow::{bail, Result};
use colored::Colorize;

use relaybot_relay::parse_link;

use crate::helpers::mark;

pub fn run(links: &[String]) -> Result<()> {
    println!();
    let invalid = print_links(links);
    println!();

    if invalid > 0 {
        bail!("{invalid} of {} link(s) are invalid", links.len());
    }
    Ok(())
}

/// Print one line per link; returns how many failed to parse.
pub fn print_links(links: &[String]) -> usize {
    let mut invalid = 0;
    for link in links {
        match parse_link(link) {
            Ok(parsed) => println!(
                "  {} {}  {}",
                mark(true),
                link,
                format!("guild {} / channel {}", parsed.community_id, parsed.channel_id).dimmed()
            ),
            Err(e) => {
                invalid += 1;
                println!("  {} {}", mark(false), e.to_string().red());
            }
        }
    }
    invalid
}
