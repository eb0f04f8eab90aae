//! Line-oriented shell: one portal, one session and one cache for many
//! commands.

use std::io::Write as _;

use anyhow::{Result, bail};
use clap::Parser;
use portal_client::Portal;
use portal_core::gateway::Gateway;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::{self, Command};

#[derive(Parser, Debug)]
#[command(name = "portal", no_binary_name = true)]
struct Line {
  #[command(subcommand)]
  command: Command,
}

pub async fn run<G: Gateway + 'static>(portal: &Portal<G>) -> Result<()> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    print!("portal> ");
    std::io::stdout().flush()?;

    let Some(line) = lines.next_line().await? else {
      break;
    };
    let words = match split_words(&line) {
      Ok(words) => words,
      Err(e) => {
        eprintln!("{e}");
        continue;
      }
    };
    match words.first().map(String::as_str) {
      None => continue,
      Some("exit" | "quit") => break,
      Some(_) => {}
    }

    match Line::try_parse_from(words) {
      Ok(parsed) => {
        if let Err(e) = commands::run(portal, parsed.command).await {
          eprintln!("error: {e:#}");
        }
      }
      Err(e) => e.print()?,
    }
  }
  Ok(())
}

/// Split a line into words on whitespace. Single or double quotes group
/// words; a backslash escapes the next character outside single quotes.
fn split_words(line: &str) -> Result<Vec<String>> {
  let mut words = Vec::new();
  let mut current = String::new();
  let mut in_word = false;
  let mut quote: Option<char> = None;
  let mut chars = line.chars();

  while let Some(c) = chars.next() {
    match (quote, c) {
      (Some(q), c) if c == q => quote = None,
      (Some('\''), c) => current.push(c),
      (_, '\\') => match chars.next() {
        Some(next) => {
          current.push(next);
          in_word = true;
        }
        None => bail!("trailing backslash"),
      },
      (Some(_), c) => current.push(c),
      (None, '"' | '\'') => {
        quote = Some(c);
        in_word = true;
      }
      (None, c) if c.is_whitespace() => {
        if in_word {
          words.push(std::mem::take(&mut current));
          in_word = false;
        }
      }
      (None, c) => {
        current.push(c);
        in_word = true;
      }
    }
  }

  if quote.is_some() {
    bail!("unterminated quote");
  }
  if in_word {
    words.push(current);
  }
  Ok(words)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn splits_on_whitespace() {
    assert_eq!(split_words("  branches   list ").unwrap(), ["branches", "list"]);
  }

  #[test]
  fn quotes_group_words() {
    assert_eq!(
      split_words(r#"news create --title "Nueva tarifa" --content 'a "b" c'"#).unwrap(),
      ["news", "create", "--title", "Nueva tarifa", "--content", "a \"b\" c"]
    );
    assert_eq!(split_words(r#"--phone """#).unwrap(), ["--phone", ""]);
  }

  #[test]
  fn backslash_escapes() {
    assert_eq!(split_words(r"a\ b c").unwrap(), ["a b", "c"]);
    assert!(split_words("a\\").is_err());
  }

  #[test]
  fn unterminated_quote_is_an_error() {
    assert!(split_words("news create --title \"oops").is_err());
  }

  #[test]
  fn lines_parse_into_commands() {
    let words = split_words("companies get 5f0c").unwrap();
    let parsed = Line::try_parse_from(words).unwrap();
    assert!(matches!(
      parsed.command,
      Command::Companies(commands::CompanyCommand::Get { ref id }) if id == "5f0c"
    ));
  }

  #[test]
  fn id_flags_reject_non_canonical_forms() {
    let canonical = "0b9e4c1e-3f7a-4d2b-9c8e-5a6f7b8c9d0e";
    assert!(Line::try_parse_from(["notifications", "read", canonical]).is_ok());
    assert!(
      Line::try_parse_from(["notifications", "read", "0B9E4C1E-3F7A-4D2B-9C8E-5A6F7B8C9D0E"])
        .is_err()
    );
    let create = |category: &str| {
      Line::try_parse_from([
        "products", "create", "--name", "Auto Plus", "--category", category, "--company",
        canonical,
      ])
    };
    assert!(create(canonical).is_ok());
    assert!(create("0b9e4c1e3f7a4d2b9c8e5a6f7b8c9d0e").is_err());
  }
}
