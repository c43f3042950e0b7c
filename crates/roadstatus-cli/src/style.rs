//! Terminal styling for `--help` and usage errors.

use clap::builder::styling::{AnsiColor, Style, Styles};

/// Bold section headers, yellow flags and commands, green placeholders.
///
/// clap drops the styling on its own when stdout is not a terminal or
/// `NO_COLOR` is set.
pub(crate) fn help_styles() -> Styles {
    Styles::styled()
        .header(Style::new().bold())
        .usage(Style::new().bold())
        .literal(AnsiColor::Yellow.on_default())
        .placeholder(AnsiColor::Green.on_default())
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().bold())
}
