use crate::{Error, Result};
use certhound_config::NginxConfig;
use regex::Regex;
use std::path::{Path, PathBuf};

/// A computed config rewrite, not yet written anywhere.
#[derive(Debug)]
pub struct PlannedPatch {
    pub output_path: PathBuf,
    pub contents: String,
}

/// Reads the web server config and swaps the current ACME challenge
/// path token and response body for the new ones. Both tokens must be
/// found before anything is replaced; a failed match leaves everything
/// untouched. The result targets a sibling file (`new_` + file name) —
/// swapping the live config is the stop/start bracket's concern.
pub async fn plan_patch(
    config: &NginxConfig,
    new_path_token: &str,
    new_body: &str,
) -> Result<PlannedPatch> {
    let text = tokio::fs::read_to_string(&config.config_path)
        .await
        .map_err(|source| Error::ReadConfig {
            path: config.config_path.clone(),
            source,
        })?;

    let path_re = Regex::new(&config.challenge_path_pattern)?;
    let body_re = Regex::new(&config.challenge_body_pattern)?;

    let old_path = capture(&path_re, &text).ok_or(Error::ConfigParse("challenge path"))?;
    let old_body = capture(&body_re, &text).ok_or(Error::ConfigParse("challenge body"))?;

    let contents = text
        .replacen(&old_path, new_path_token, 1)
        .replacen(&old_body, new_body, 1);

    Ok(PlannedPatch {
        output_path: sibling_path(&config.config_path),
        contents,
    })
}

pub async fn write_patch(patch: &PlannedPatch) -> Result<()> {
    tokio::fs::write(&patch.output_path, &patch.contents)
        .await
        .map_err(|source| Error::WriteConfig {
            path: patch.output_path.clone(),
            source,
        })
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    let matched = re.captures(text)?.get(1)?.as_str();
    // An empty token has nothing to anchor the replacement on.
    if matched.is_empty() {
        return None;
    }
    Some(matched.to_string())
}

fn sibling_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("new_{file_name}"))
}
