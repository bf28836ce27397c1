use {
    anyhow::Context,
    bstr::{BString, ByteVec},
};

use crate::{
    args::{Configurable, Usage},
    datetime::Reference,
    parse::{BufReadExt, BytesExt},
};

/// The CLI parsing configuration for reading reference datetimes.
///
/// This will greedily consume all remaining positional arguments as
/// references. When there are none, the current time is the only reference.
/// A positional argument of `-` means "read references from stdin, one per
/// line." Blank lines on stdin are skipped.
#[derive(Clone, Debug, Default)]
pub struct References {
    positional: Vec<Argument>,
}

impl References {
    /// Run the given function over each reference read from the CLI.
    ///
    /// Iteration stops when the closure returns false or returns an error.
    pub fn try_map(
        self,
        mut f: impl FnMut(Reference) -> anyhow::Result<bool>,
    ) -> anyhow::Result<()> {
        if self.positional.is_empty() {
            f(Reference::now())?;
            return Ok(());
        }
        for arg in self.positional {
            match arg {
                Argument::Positional(arg) => {
                    let reference = arg
                        .parse::<Reference>()
                        .context("invalid reference datetime")?;
                    if !f(reference)? {
                        return Ok(());
                    }
                }
                Argument::Stdin => {
                    let mut keep_going = true;
                    std::io::stdin().lock().for_byte_line(|line| {
                        let content = line.content().trim_ascii();
                        if content.is_empty() {
                            return Ok(true);
                        }
                        keep_going = content
                            .parse::<Reference>()
                            .context("invalid reference datetime")
                            .and_then(&mut f)
                            .with_context(|| {
                                format!("line {} of <stdin>", line.number())
                            })?;
                        Ok(keep_going)
                    })?;
                    if !keep_going {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }
}

impl Configurable for References {
    fn configure(
        &mut self,
        _: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        match *arg {
            lexopt::Arg::Value(ref mut v) => {
                let v = std::mem::take(v);
                let bytes = Vec::from_os_string(v).map_err(|arg| {
                    anyhow::anyhow!(
                        "cadence requires that positional arguments \
                         be valid UTF-8 in non-Unix environments, \
                         but `{arg:?}` is not valid UTF-8",
                    )
                })?;
                let arg = if bytes == b"-" {
                    Argument::Stdin
                } else {
                    Argument::Positional(BString::from(bytes))
                };
                self.positional.push(arg);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        &[Reference::ARG]
    }
}

/// A single positional argument.
#[derive(Clone, Debug)]
enum Argument {
    /// A reference datetime that hasn't been parsed yet.
    ///
    /// On Windows, we require that this is valid UTF-8.
    Positional(BString),
    /// A `-`, which stands in for every line on stdin.
    Stdin,
}
