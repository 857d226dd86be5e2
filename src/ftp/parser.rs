//! Splits one control-channel line into a verb and an argument, the way the teacher's DNS side
//! splits a wire buffer into header/question/records: a small fixed lookup rather than a general
//! grammar, since the protocol has a closed set of verbs.
use std::fmt;

/// The fixed set of verbs the parser recognises. `Unknown` carries the verb text back up so the
/// dispatch path can still log what the client actually sent before replying 502.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    User,
    Pass,
    Syst,
    Type,
    Mode,
    Stru,
    Feat,
    Size,
    Mdtm,
    Cwd,
    Cdup,
    Pasv,
    Retr,
    Stor,
    List,
    Nlst,
    Dele,
    Rnfr,
    Rnto,
    Rmd,
    Mkd,
    Pwd,
    Quit,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One parsed control-channel line.
#[derive(Debug, Clone)]
pub struct Command {
    pub verb: Verb,
    pub argument: String,
}

/// Splits `line` on the first run of ASCII whitespace into an uppercased verb and a trimmed
/// argument, then looks the verb up in the fixed table. `None` means the verb is not recognised
/// at all — the caller replies 502 and logs the raw text since there's no `Verb` to carry.
pub fn parse(line: &str) -> Option<Command> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb_text = parts.next().unwrap_or("").to_ascii_uppercase();
    let argument = parts.next().unwrap_or("").trim().to_string();

    let verb = match verb_text.as_str() {
        "USER" => Verb::User,
        "PASS" => Verb::Pass,
        "SYST" => Verb::Syst,
        "TYPE" => Verb::Type,
        "MODE" => Verb::Mode,
        "STRU" => Verb::Stru,
        "FEAT" => Verb::Feat,
        "SIZE" => Verb::Size,
        "MDTM" => Verb::Mdtm,
        "CWD" => Verb::Cwd,
        "CDUP" => Verb::Cdup,
        "PASV" => Verb::Pasv,
        "RETR" => Verb::Retr,
        "STOR" => Verb::Stor,
        "LIST" => Verb::List,
        "NLST" => Verb::Nlst,
        "DELE" => Verb::Dele,
        "RNFR" => Verb::Rnfr,
        "RNTO" => Verb::Rnto,
        "RMD" => Verb::Rmd,
        "MKD" => Verb::Mkd,
        "PWD" => Verb::Pwd,
        "QUIT" => Verb::Quit,
        _ => return None,
    };

    Some(Command { verb, argument })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_verb_and_argument() {
        let cmd = parse("CWD /sub/dir\r\n").unwrap();
        assert_eq!(cmd.verb, Verb::Cwd);
        assert_eq!(cmd.argument, "/sub/dir");
    }

    #[test]
    fn lowercases_verb_is_accepted() {
        let cmd = parse("user anonymous").unwrap();
        assert_eq!(cmd.verb, Verb::User);
        assert_eq!(cmd.argument, "anonymous");
    }

    #[test]
    fn verb_with_no_argument() {
        let cmd = parse("PWD").unwrap();
        assert_eq!(cmd.verb, Verb::Pwd);
        assert_eq!(cmd.argument, "");
    }

    #[test]
    fn unknown_verb_is_none() {
        assert!(parse("FROB something").is_none());
    }

    #[test]
    fn argument_whitespace_is_trimmed() {
        let cmd = parse("RNFR    spaced-name   \r\n").unwrap();
        assert_eq!(cmd.argument, "spaced-name");
    }
}
