//! ID resolver module
//!
//! Handles resolution of UUID prefixes to full UUIDs by querying the API.
//! This allows users to specify short, unambiguous prefixes instead of full UUIDs.

use anyhow::{Context, Result, anyhow};
use eebuilder_client::BuilderClient;
use uuid::Uuid;

/// Resolve a build ID or prefix to a full UUID
///
/// A full UUID is returned without contacting the API. Anything else is
/// matched against the ids of all known builds and must match exactly one.
pub async fn resolve_build_id(client: &BuilderClient, input: &str) -> Result<Uuid> {
    let input = input.trim();
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let builds = client
        .list_builds()
        .await
        .context("Failed to fetch builds for ID resolution")?;

    match_prefix(builds.iter().map(|b| b.build_id), input)
}

/// Picks the single id starting with `prefix`
fn match_prefix(ids: impl Iterator<Item = Uuid>, prefix: &str) -> Result<Uuid> {
    let prefix = prefix.to_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("Build ID must not be empty"));
    }

    let matches: Vec<Uuid> = ids
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => Err(anyhow!("No build found with ID starting with '{}'", prefix)),
        1 => Ok(matches[0]),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple builds: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<Uuid> {
        vec![
            Uuid::parse_str("3fa85f64-5717-4562-b3fc-2c963f66afa6").unwrap(),
            Uuid::parse_str("3fb11111-5717-4562-b3fc-2c963f66afa6").unwrap(),
            Uuid::parse_str("9c0e2222-5717-4562-b3fc-2c963f66afa6").unwrap(),
        ]
    }

    #[test]
    fn test_unique_prefix() {
        let id = match_prefix(ids().into_iter(), "9C0E").unwrap();
        assert_eq!(id, ids()[2]);
    }

    #[test]
    fn test_ambiguous_prefix() {
        let err = match_prefix(ids().into_iter(), "3f").unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
    }

    #[test]
    fn test_unknown_and_empty_prefix() {
        assert!(match_prefix(ids().into_iter(), "ffff").is_err());
        assert!(match_prefix(ids().into_iter(), "").is_err());
    }
}
