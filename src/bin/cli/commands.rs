//! Command implementations for the CLI tool.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use zipup::{CipherScheme, EditResult, Error, Password, Result, Session};

use crate::OutputFormat;
use crate::exit_codes::ExitCode;
use crate::output::{ArchiveInfo, create_formatter};
use crate::password::{get_or_prompt_password, prompt_for, provided};
use crate::settings::Settings;

/// Options shared by every archive command.
pub struct Context {
    pub format: OutputFormat,
    pub password: Option<String>,
}

/// Arguments of the passwd command.
pub struct PasswdConfig<'a> {
    pub archive_path: &'a Path,
    pub old: Option<String>,
    pub new: Option<String>,
    pub scheme: Option<CipherScheme>,
    pub remove: bool,
}

fn open_session(archive: &Path, ctx: &Context) -> Result<Session> {
    let mut session = Session::open(archive)?;
    session.set_session_password(provided(ctx.password.clone()));
    Ok(session)
}

/// Runs `op`; if it fails for lack of a working password and a terminal is
/// attached, prompts once and runs it again.
fn with_password_retry<T>(
    session: &mut Session,
    mut op: impl FnMut(&mut Session) -> Result<T>,
) -> Result<T> {
    match op(session) {
        Err(e) if e.is_password_error() && io::stdin().is_terminal() => {
            let Some(password) = prompt_for(&session.path().display().to_string()) else {
                return Err(e);
            };
            session.set_session_password(Some(password));
            op(session)
        }
        other => other,
    }
}

/// Prompts up front when appending to a protected archive without a password,
/// so new entries are encrypted like the existing ones.
fn ensure_append_password(session: &mut Session) -> Result<()> {
    if session.session_password().is_none()
        && session.has_password()?
        && io::stdin().is_terminal()
    {
        let password = prompt_for(&session.path().display().to_string());
        if let Some(password) = &password {
            session.verify_password(Some(password))?;
        }
        session.set_session_password(password);
    }
    Ok(())
}

fn print_edit(ctx: &Context, action: &str, result: &EditResult) -> ExitCode {
    print!("{}", create_formatter(ctx.format).format_edit_result(action, result));
    ExitCode::from_warnings(&result.warnings)
}

/// Create command implementation
pub fn create(archive: &Path, ctx: &Context) -> Result<ExitCode> {
    let session = Session::create(archive)?;
    if ctx.format == OutputFormat::Human {
        println!("Created {} ({})", session.path().display(), session.format_kind());
    }
    Ok(ExitCode::Success)
}

/// Ls command implementation
pub fn ls(archive: &Path, prefix: &str, ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(archive, ctx)?;
    session.set_prefix(prefix)?;
    print!("{}", create_formatter(ctx.format).format_view(session.view()));
    Ok(ExitCode::Success)
}

/// Cat command implementation
pub fn cat(archive: &Path, path: &str, ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(archive, ctx)?;
    let data = with_password_retry(&mut session, |s| s.read(path))?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(ExitCode::Success)
}

/// Add command implementation
///
/// Files land in `into` under their names; directories are added
/// recursively as `into/<dir name>/...`.
pub fn add(archive: &Path, files: &[PathBuf], into: &str, ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(archive, ctx)?;
    ensure_append_password(&mut session)?;
    session.set_prefix(into)?;
    let base = session.current_prefix().to_string();
    let existing = session.entries()?.len();

    let (dirs, plain): (Vec<&PathBuf>, Vec<&PathBuf>) = files.iter().partition(|p| p.is_dir());
    let mut total = EditResult::default();
    if !plain.is_empty() {
        merge(&mut total, session.add_files(&plain)?);
    }
    for dir in dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidEntryPath(dir.display().to_string()))?;
        session.set_prefix(&format!("{base}{name}/"))?;
        merge(&mut total, session.add_directory_tree(dir)?);
    }
    total.entries_kept = existing;
    Ok(print_edit(ctx, "add", &total))
}

fn merge(total: &mut EditResult, step: EditResult) {
    total.entries_added += step.entries_added;
    total.total_bytes += step.total_bytes;
    total.archive_bytes = step.archive_bytes;
    total.warnings.extend(step.warnings);
}

/// Mkdir command implementation
pub fn mkdir(archive: &Path, name: &str, into: &str, ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(archive, ctx)?;
    session.set_prefix(into)?;
    let result = session.create_folder(name)?;
    Ok(print_edit(ctx, "mkdir", &result))
}

/// Rm command implementation
pub fn rm(archive: &Path, paths: &[String], ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(archive, ctx)?;
    let result = with_password_retry(&mut session, |s| s.delete(paths))?;
    Ok(print_edit(ctx, "rm", &result))
}

/// Mv command implementation
pub fn mv(archive: &Path, from: &str, to: &str, ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(archive, ctx)?;
    let result = with_password_retry(&mut session, |s| s.rename(from, to))?;
    Ok(print_edit(ctx, "mv", &result))
}

/// Comment command implementation
pub fn comment(archive: &Path, set: Option<&str>, ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(archive, ctx)?;
    match set {
        Some(text) => {
            let result = with_password_retry(&mut session, |s| s.set_comment(text))?;
            Ok(print_edit(ctx, "comment", &result))
        }
        None => {
            let text = session.comment()?;
            print!("{}", create_formatter(ctx.format).format_comment(&text));
            Ok(ExitCode::Success)
        }
    }
}

/// Passwd command implementation
pub fn passwd(config: &PasswdConfig<'_>, settings: &Settings, ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(config.archive_path, ctx)?;
    let kind = session.format_kind();
    if !kind.supports_password() {
        return Err(Error::UnsupportedFormat {
            format: Some(kind),
            operation: "password protection".to_string(),
        });
    }

    let mut old: Option<Password> =
        provided(config.old.clone()).or_else(|| session.session_password().cloned());
    if old.is_none() && session.has_password()? && io::stdin().is_terminal() {
        old = prompt_for(&session.path().display().to_string());
    }
    if session.has_password()? {
        session.verify_password(old.as_ref())?;
    }

    let new = if config.remove {
        None
    } else {
        match get_or_prompt_password(config.new.clone(), true) {
            Some(password) => Some(password),
            None => {
                eprintln!("Error: a new password is required (or pass --remove)");
                return Ok(ExitCode::BadArgs);
            }
        }
    };

    let scheme = config.scheme.unwrap_or_else(|| settings.scheme());
    let result = session.set_password(old, new, scheme)?;
    Ok(print_edit(ctx, "passwd", &result))
}

/// Search command implementation
pub fn search(archive: &Path, text: &str, ctx: &Context) -> Result<ExitCode> {
    let session = open_session(archive, ctx)?;
    let hits = session.search(text)?;
    print!("{}", create_formatter(ctx.format).format_search(&hits));
    Ok(if hits.is_empty() {
        ExitCode::Warning
    } else {
        ExitCode::Success
    })
}

/// Extract command implementation
pub fn extract(archive: &Path, dest: &Path, paths: &[String], ctx: &Context) -> Result<ExitCode> {
    let mut session = open_session(archive, ctx)?;
    let count = with_password_retry(&mut session, |s| {
        if paths.is_empty() {
            s.extract_all(dest)
        } else {
            s.extract_selected(paths, dest)
        }
    })?;
    print!(
        "{}",
        create_formatter(ctx.format).format_extract_result(count, &dest.display().to_string())
    );
    Ok(ExitCode::Success)
}

/// Info command implementation
pub fn info(archive: &Path, ctx: &Context) -> Result<ExitCode> {
    let session = open_session(archive, ctx)?;
    let entries = session.entries()?;
    let info = ArchiveInfo {
        path: session.path().display().to_string(),
        format: session.format_kind(),
        obfuscated: session.format().handle().is_obfuscated(),
        entry_count: entries.len(),
        directory_count: entries.iter().filter(|e| e.is_directory).count(),
        total_size: entries.iter().map(|e| e.size).sum(),
        archive_size: std::fs::metadata(session.path())?.len(),
        password: session.password_state()?,
        comment: session.comment()?,
    };
    print!("{}", create_formatter(ctx.format).format_info(&info));
    Ok(ExitCode::Success)
}

/// Config command implementation
pub fn config(key: Option<&str>, value: Option<&str>) -> Result<ExitCode> {
    let path = Settings::default_path()
        .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;
    let mut settings = Settings::load_from(&path)?;

    match (key, value) {
        (None, _) => {
            for key in crate::settings::KEYS {
                println!("{key} = {}", settings.get(key).unwrap_or_default());
            }
        }
        (Some(key), None) => match settings.get(key) {
            Some(value) => println!("{value}"),
            None => {
                return Err(Error::Config(format!("unknown key '{key}'")));
            }
        },
        (Some(key), Some(value)) => {
            settings.set(key, value)?;
            settings.save_to(&path)?;
            println!("{key} = {value}");
        }
    }
    Ok(ExitCode::Success)
}
