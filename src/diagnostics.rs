/// Debug rendering of cache markup
use std::sync::LazyLock;

use regex::{Captures, Regex};

static QUOTED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*"|'[^']*'"#).expect("valid quoted value pattern"));
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*<([A-Za-z])").expect("valid open tag pattern"));

/// Make a cache blob readable in the console: one element per line and
/// attribute values folded onto a single line.
pub fn render_for_debug_log(markup: &str) -> String {
    let collapsed = QUOTED_VALUE.replace_all(markup, |caps: &Captures| {
        WHITESPACE_RUN.replace_all(&caps[0], " ").into_owned()
    });
    OPEN_TAG
        .replace_all(&collapsed, "\n<$1")
        .trim_start()
        .to_string()
}
