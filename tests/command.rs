/*!
Defines a simple command snapshotting mechanism.

A snapshot records whether a command succeeded, its exit code and everything
it wrote to stdout and stderr. Commands can be given bytes for stdin, which
is how references are usually fed to `cadence` in a pipeline.

The `Command` type here is an owned wrapper around `std::process::Command`,
which makes building commands in tests a little less noisy.
*/

use std::{
    collections::BTreeMap,
    env::consts::EXE_SUFFIX,
    ffi::{OsStr, OsString},
    io::Write,
    path::{Path, PathBuf},
    process, thread,
};

use bstr::{BString, ByteSlice, ByteVec};

macro_rules! run_and_snapshot {
    ($cmd:expr, $body:expr) => {{
        let snap = $cmd.snapshot();
        let mut settings = insta::Settings::clone_current();
        settings.set_info(snap.info());
        settings.set_omit_expression(true);
        settings.bind(|| ($body)(snap.snapshot()));
    }};
}

macro_rules! assert_cmd_snapshot {
    ($spawnable:expr, @$snapshot:literal $(,)?) => {{
        $crate::command::run_and_snapshot!($spawnable, |snapshot: &str| {
            insta::assert_snapshot!(snapshot, @$snapshot);
        });
    }};
}

pub(crate) use {assert_cmd_snapshot, run_and_snapshot};

/// A snapshot generated from running a command.
pub struct Snapshot {
    /// Shown in `cargo insta review`, but not part of the snapshot itself.
    info: CommandInfo,
    snapshot: String,
}

impl Snapshot {
    fn new(info: CommandInfo, output: &process::Output) -> Snapshot {
        let snapshot = format!(
            "success: {:?}\n\
             exit_code: {}\n\
             ----- stdout -----\n\
             {}\n\
             ----- stderr -----\n\
             {}",
            output.status.success(),
            output.status.code().unwrap_or(!0),
            bytes_to_string(&output.stdout),
            bytes_to_string(&output.stderr),
        );
        Snapshot { info, snapshot }
    }

    pub fn info(&self) -> &CommandInfo {
        &self.info
    }

    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }
}

/// A command along with the bytes to write to its stdin.
#[derive(Debug)]
pub struct Piped {
    cmd: Command,
    stdin: BString,
}

impl Piped {
    /// Run the command, feeding it stdin from another thread, and snapshot
    /// its output.
    pub fn snapshot(&self) -> Snapshot {
        let mut cmd = self.cmd.std();
        cmd.stdin(process::Stdio::piped());
        cmd.stdout(process::Stdio::piped());
        cmd.stderr(process::Stdio::piped());
        let mut child = cmd.spawn().unwrap();
        let mut child_stdin = child.stdin.take().unwrap();
        let stdin = self.stdin.clone();
        let writer = thread::spawn(move || child_stdin.write_all(&stdin));
        let output = child.wait_with_output().unwrap();
        // The command may exit before reading all of stdin, e.g., when a
        // line fails to parse.
        let _ = writer.join().unwrap();

        let mut info = CommandInfo::new(&cmd);
        info.stdin = Some(bytes_to_string(&self.stdin));
        Snapshot::new(info, &output)
    }
}

/// An owned wrapper around `std::process::Command`.
#[derive(Clone, Debug)]
pub struct Command {
    bin: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl Command {
    pub fn new(bin: impl AsRef<OsStr>) -> Command {
        Command {
            bin: bin.as_ref().to_os_string(),
            args: vec![],
            envs: vec![],
        }
    }

    /// Add an argument to the end of this command invocation.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Command {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add arguments to the end of this command invocation.
    pub fn args(
        mut self,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    ) -> Command {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Set an environment variable.
    pub fn env(
        mut self,
        key: impl AsRef<OsStr>,
        val: impl AsRef<OsStr>,
    ) -> Command {
        self.envs
            .push((key.as_ref().to_os_string(), val.as_ref().to_os_string()));
        self
    }

    /// Returns this command with the given data passed into its stdin.
    pub fn stdin(self, stdin: impl Into<Vec<u8>>) -> Piped {
        Piped { cmd: self, stdin: BString::from(stdin.into()) }
    }

    /// Turn this wrapper into a fresh `std::process::Command`.
    pub fn std(&self) -> process::Command {
        let mut cmd = process::Command::new(&self.bin);
        cmd.args(self.args.iter());
        for (key, val) in self.envs.iter() {
            cmd.env(key, val);
        }
        cmd
    }

    /// Runs this command with an empty stdin and snapshots its output.
    pub fn snapshot(&self) -> Snapshot {
        let mut cmd = self.std();
        cmd.stdin(process::Stdio::null());
        let output = cmd.output().unwrap();
        Snapshot::new(CommandInfo::new(&cmd), &output)
    }
}

/// Information about a command, shown in the `cargo insta review` user
/// interface.
#[derive(Clone, Debug, serde::Serialize)]
pub struct CommandInfo {
    bin: String,
    args: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdin: Option<String>,
}

impl CommandInfo {
    fn new(cmd: &process::Command) -> CommandInfo {
        let bin = Path::new(cmd.get_program())
            .file_name()
            .map(os_str_to_string)
            .unwrap_or_else(|| "{UNKNOWN}".to_string());
        let bin = bin.strip_suffix(EXE_SUFFIX).unwrap_or(&bin).to_string();
        CommandInfo {
            bin,
            args: cmd.get_args().map(os_str_to_string).collect(),
            env: cmd
                .get_envs()
                .map(|(k, v)| {
                    let v = v.unwrap_or(OsStr::new(""));
                    (os_str_to_string(k), os_str_to_string(v))
                })
                .collect(),
            stdin: None,
        }
    }
}

/// Return a command for the Cargo project binary with the given name.
pub fn bin(name: &str) -> Command {
    Command::new(bin_path(name))
}

fn bin_path(name: &str) -> PathBuf {
    std::env::current_exe()
        .unwrap()
        .parent()
        .expect("executable's directory")
        .parent()
        .expect("target profile directory")
        .join(format!("{name}{EXE_SUFFIX}"))
}

/// Turns a slice of bytes into a human readable string, escaping invalid
/// UTF-8.
fn bytes_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(string) => string.to_string(),
        Err(_) => bytes.escape_bytes().to_string(),
    }
}

fn os_str_to_string(os_str: &OsStr) -> String {
    bytes_to_string(&Vec::from_os_str_lossy(os_str))
}
