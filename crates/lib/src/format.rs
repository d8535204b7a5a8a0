//! Rewrites model markdown into Slack's mrkdwn dialect.

use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"###\s*(.*)").expect("heading pattern"));
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^-\s").expect("bullet pattern"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern"));
static UNSUPPORTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#_`]").expect("strip pattern"));

/// Convert model output to Slack mrkdwn: `### heading` becomes `*heading*`,
/// `- ` list markers become `• `, `**bold**` folds to `*bold*`, and any
/// remaining `#`, `_`, or backtick is stripped. The strip runs last so it
/// also catches markers left over from the earlier rules or emitted by the
/// model directly.
pub fn format_for_slack(text: &str) -> String {
    let text = HEADING.replace_all(text, "*$1*");
    let text = BULLET.replace_all(&text, "• ");
    let text = BOLD.replace_all(&text, "*$1*");
    UNSUPPORTED.replace_all(&text, "").into_owned()
}
