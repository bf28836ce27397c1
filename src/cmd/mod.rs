use std::process::ExitCode;

mod occurrence;

const USAGE: &'static str = "\
Find the occurrences of cron-like recurring schedules.

USAGE:
    cadence <command> ...

COMMANDS:
    next  Print the next occurrences of a schedule
    prev  Print the previous occurrences of a schedule
";

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<ExitCode> {
    let cmd = crate::args::next_as_command(USAGE, p)?;
    match &*cmd {
        "next" => occurrence::next(p),
        "prev" | "previous" => occurrence::prev(p),
        unk => anyhow::bail!("unrecognized command '{}'", unk),
    }
}
