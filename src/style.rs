use std::{
    fmt::Display,
    io::IsTerminal,
    sync::{Arc, LazyLock},
};

use anstyle::{AnsiColor, Style};

/// A theme that indicates how output on stderr should be styled.
///
/// Occurrences on stdout are meant to be consumed by other programs, so they
/// are never styled. Only log messages and notices are.
///
/// The styles returned may be completely unstyled, for example, when stderr
/// isn't a tty or colors have been disabled.
#[derive(Clone, Debug)]
pub struct Theme {
    inner: Option<Arc<ThemeInner>>,
}

impl Theme {
    /// Returns a theme for stderr.
    pub fn stderr() -> &'static Theme {
        static THEME: LazyLock<Theme> = LazyLock::new(|| {
            if !tty_stderr() || !can_use_colors() {
                return Theme { inner: None };
            }
            Theme { inner: Some(Arc::new(ThemeInner::default())) }
        });
        &*THEME
    }

    /// Styles the timestamp at the start of a log message.
    pub fn timestamp<T: Display>(&self, data: T) -> Styled<'_, T> {
        let style = self.inner().map(|inner| &inner.timestamp);
        Styled { data, style }
    }

    /// Styles a log level according to its severity.
    pub fn level(&self, level: log::Level) -> Styled<'_, log::Level> {
        let style = self.inner().map(|inner| match level {
            log::Level::Error => &inner.error,
            log::Level::Warn => &inner.warn,
            log::Level::Info | log::Level::Debug | log::Level::Trace => {
                &inner.plain
            }
        });
        Styled { data: level, style }
    }

    /// Styles a notice that some reference has no occurrence.
    pub fn notice<T: Display>(&self, data: T) -> Styled<'_, T> {
        let style = self.inner().map(|inner| &inner.warn);
        Styled { data, style }
    }

    fn inner(&self) -> Option<&ThemeInner> {
        self.inner.as_deref()
    }
}

#[derive(Debug)]
struct ThemeInner {
    timestamp: Style,
    error: Style,
    warn: Style,
    plain: Style,
}

impl Default for ThemeInner {
    fn default() -> ThemeInner {
        ThemeInner {
            timestamp: Style::new()
                .bold()
                .fg_color(Some(AnsiColor::Magenta.into())),
            error: Style::new().bold().fg_color(Some(AnsiColor::Red.into())),
            warn: Style::new().fg_color(Some(AnsiColor::Yellow.into())),
            plain: Style::new(),
        }
    }
}

/// A possibly unstyled piece of renderable data.
///
/// When this is unstyled, its `Display` impl does no styling and just
/// renders the underlying data.
#[derive(Clone, Debug)]
pub struct Styled<'s, T> {
    data: T,
    style: Option<&'s Style>,
}

impl<'s, T: Display> Display for Styled<'s, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let Some(style) = self.style else {
            return self.data.fmt(f);
        };
        write!(f, "{style}{}{style:#}", self.data)
    }
}

/// Returns true if there's a tty attached to stderr.
fn tty_stderr() -> bool {
    static YES: LazyLock<bool> =
        LazyLock::new(|| std::io::stderr().is_terminal());
    *YES
}

/// Whether colors have been globally disabled or not.
///
/// Colors are disabled by a non-empty `NO_COLOR` or by `TERM=dumb`.
fn can_use_colors() -> bool {
    static YES: LazyLock<bool> = LazyLock::new(|| {
        if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            return false;
        }
        std::env::var_os("TERM").map_or(true, |v| v != "dumb")
    });
    *YES
}
