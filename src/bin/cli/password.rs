//! Password handling for CLI operations.

use rpassword::prompt_password;
use zipup::Password;

/// Returns the password given on the command line, if any
pub fn provided(password: Option<String>) -> Option<Password> {
    password.map(Password::new).filter(|p| !p.is_empty())
}

/// Prompts for the password of a protected archive
pub fn prompt_for(archive: &str) -> Option<Password> {
    match prompt_password(format!("Password for {archive}: ")) {
        Ok(pwd) if !pwd.is_empty() => Some(Password::new(pwd)),
        _ => None,
    }
}

/// Prompts for a new password with confirmation
pub fn confirm_password() -> Option<Password> {
    let pwd1 = match prompt_password("New password: ") {
        Ok(pwd) => pwd,
        Err(_) => return None,
    };

    if pwd1.is_empty() {
        eprintln!("Password cannot be empty");
        return None;
    }

    let pwd2 = match prompt_password("Confirm password: ") {
        Ok(pwd) => pwd,
        Err(_) => return None,
    };

    if pwd1 == pwd2 {
        Some(Password::new(pwd1))
    } else {
        eprintln!("Passwords do not match");
        None
    }
}

/// Uses the provided password, or prompts with optional confirmation
pub fn get_or_prompt_password(provided: Option<String>, confirm: bool) -> Option<Password> {
    if let Some(pwd) = self::provided(provided) {
        return Some(pwd);
    }

    if confirm {
        confirm_password()
    } else {
        match prompt_password("Password: ") {
            Ok(pwd) if !pwd.is_empty() => Some(Password::new(pwd)),
            _ => None,
        }
    }
}
