use core::fmt::{self, Display, Formatter};

use ahash::AHashMap;
use mailparse::MailAddr;

/// ESMTP parameters of a MAIL FROM command (RFC 5321 Section 3.3).
///
/// Keys are stored uppercased. Only `SIZE` is interpreted; everything else is
/// accepted and ignored.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct MailParameters {
    params: AHashMap<String, Option<String>>,
}

impl MailParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `KEY=VALUE` and `FLAG` tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A parameter appears multiple times
    /// - SIZE parameter has an invalid value (non-numeric or zero)
    pub fn from_params_str(params_str: &str) -> Result<Self, String> {
        let mut params = Self::new();

        for token in params_str.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .map_or((token, None), |(key, value)| (key, Some(value)));
            let key = key.to_ascii_uppercase();

            if params.params.contains_key(&key) {
                return Err(format!("Duplicate parameter '{key}' not allowed"));
            }

            if key == "SIZE" {
                match value.map(str::parse::<usize>) {
                    Some(Ok(0)) => return Err(String::from("SIZE=0 is not allowed")),
                    Some(Ok(_)) => {}
                    _ => return Err(format!("Invalid SIZE value: {}", value.unwrap_or(""))),
                }
            }

            params.params.insert(key, value.map(str::to_string));
        }

        Ok(params)
    }

    /// Adds a parameter with a value.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.params
            .insert(key.to_ascii_uppercase(), Some(value.into()));
    }

    /// Gets a parameter value by key (case-insensitive).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(&key.to_ascii_uppercase())?.as_deref()
    }

    /// The declared message size, if any.
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        self.get("SIZE")?.parse().ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl Display for MailParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.params.keys().collect();
        keys.sort();

        for (ix, key) in keys.into_iter().enumerate() {
            if ix > 0 {
                f.write_str(" ")?;
            }

            match &self.params[key] {
                None => f.write_str(key)?,
                Some(value) => write!(f, "{key}={value}")?,
            }
        }

        Ok(())
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum HeloVariant {
    Ehlo(String),
    Helo(String),
}

impl Display for HeloVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ehlo(id) => write!(f, "EHLO {id}"),
            Self::Helo(id) => write!(f, "HELO {id}"),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Command {
    Helo(HeloVariant),
    /// `None` is the null reverse-path (`MAIL FROM:<>`)
    MailFrom(Option<String>, MailParameters),
    RcptTo(String),
    Auth {
        mechanism: String,
        /// Base64 initial response sent on the AUTH line itself
        initial: Option<String>,
    },
    Data,
    Rset,
    Noop,
    Quit,
    /// A known command with unusable arguments
    Invalid(String),
    /// Not a command this server knows
    Unknown(String),
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(variant) => write!(fmt, "{variant}"),
            Self::MailFrom(sender, params) => {
                write!(fmt, "MAIL FROM:<{}>", sender.as_deref().unwrap_or_default())?;
                if !params.is_empty() {
                    write!(fmt, " {params}")?;
                }
                Ok(())
            }
            Self::RcptTo(recipient) => write!(fmt, "RCPT TO:<{recipient}>"),
            // Never log credentials
            Self::Auth { mechanism, initial } => match initial {
                Some(_) => write!(fmt, "AUTH {mechanism} ****"),
                None => write!(fmt, "AUTH {mechanism}"),
            },
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(reason) => fmt.write_str(reason),
            Self::Unknown(command) => fmt.write_str(command),
        }
    }
}

/// Case-insensitive `strip_prefix`
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &s[prefix.len()..])
}

/// The first mailbox in `raw`, or `None` for an empty path
fn single_address(raw: &str) -> Result<Option<String>, String> {
    let list = mailparse::addrparse(raw).map_err(|err| err.to_string())?;

    match list.iter().next() {
        None => Ok(None),
        Some(MailAddr::Single(info)) => Ok(Some(info.addr.clone())),
        Some(MailAddr::Group(_)) => Err(format!("Group address not accepted: {raw}")),
    }
}

impl Command {
    fn parse_mail_from(rest: &str) -> Result<Self, Self> {
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(Self::Invalid("Expected reverse-path in MAIL FROM".to_string()));
        }

        let (path, params) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));

        let params = MailParameters::from_params_str(params).map_err(Self::Invalid)?;

        if path == "<>" {
            return Ok(Self::MailFrom(None, params));
        }

        single_address(path)
            .map(|sender| Self::MailFrom(sender, params))
            .map_err(Self::Invalid)
    }

    fn parse_rcpt_to(rest: &str) -> Result<Self, Self> {
        match single_address(rest.trim()) {
            Ok(Some(recipient)) => Ok(Self::RcptTo(recipient)),
            Ok(None) => Err(Self::Invalid("Expected forward-path in RCPT TO".to_string())),
            Err(err) => Err(Self::Invalid(err)),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(command: &str) -> Result<Self, Self::Error> {
        let trimmed = command.trim();

        if let Some(rest) = strip_prefix_ci(trimmed, "MAIL FROM:") {
            return Self::parse_mail_from(rest);
        }

        if let Some(rest) = strip_prefix_ci(trimmed, "RCPT TO:") {
            return Self::parse_rcpt_to(rest);
        }

        let (verb, args) = trimmed
            .split_once(' ')
            .map_or((trimmed, ""), |(verb, args)| (verb, args.trim()));

        match verb.to_ascii_uppercase().as_str() {
            "EHLO" | "HELO" if args.is_empty() => {
                Err(Self::Invalid(format!("Expected hostname in {trimmed}")))
            }
            "EHLO" => Ok(Self::Helo(HeloVariant::Ehlo(args.to_string()))),
            "HELO" => Ok(Self::Helo(HeloVariant::Helo(args.to_string()))),
            "AUTH" => {
                let mut parts = args.split_whitespace();

                parts.next().map_or_else(
                    || Err(Self::Invalid("Expected mechanism in AUTH".to_string())),
                    |mechanism| {
                        Ok(Self::Auth {
                            mechanism: mechanism.to_ascii_uppercase(),
                            initial: parts.next().map(str::to_string),
                        })
                    },
                )
            }
            "DATA" => Ok(Self::Data),
            "RSET" => Ok(Self::Rset),
            "NOOP" => Ok(Self::Noop),
            "QUIT" => Ok(Self::Quit),
            "MAIL" | "RCPT" => Err(Self::Invalid(format!("Syntax error in {trimmed}"))),
            _ => Err(Self::Unknown(trimmed.to_string())),
        }
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Self;

    fn try_from(command: &[u8]) -> Result<Self, Self::Error> {
        std::str::from_utf8(command).map_or_else(
            |_| Err(Self::Unknown("Unable to interpret command".to_string())),
            Self::try_from,
        )
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(command: &str) -> Command {
        Command::try_from(command).unwrap_or_else(|err| err)
    }

    #[test]
    fn verbs_are_case_insensitive() {
        for ehlo in ["EHLO client", "ehlo client", "EhLo client"] {
            assert_eq!(
                parse(ehlo),
                Command::Helo(HeloVariant::Ehlo("client".to_string()))
            );
        }

        assert_eq!(parse("data\r\n"), Command::Data);
        assert_eq!(parse("Quit"), Command::Quit);
        assert_eq!(parse("rset"), Command::Rset);
        assert_eq!(parse("NOOP anything"), Command::Noop);
    }

    #[test]
    fn helo_requires_hostname() {
        assert!(matches!(Command::try_from("HELO"), Err(Command::Invalid(_))));
        assert_eq!(
            parse("HELO relay.example.com\r\n"),
            Command::Helo(HeloVariant::Helo("relay.example.com".to_string()))
        );
    }

    #[test]
    fn mail_from_command() {
        assert_eq!(
            parse("MAIL FROM:<sender@example.com>"),
            Command::MailFrom(Some("sender@example.com".to_string()), MailParameters::new())
        );
        assert_eq!(
            parse("mail from: <>"),
            Command::MailFrom(None, MailParameters::new())
        );
        assert!(matches!(
            Command::try_from("MAIL FROM:"),
            Err(Command::Invalid(_))
        ));
        assert!(matches!(
            Command::try_from("MAIL sender@example.com"),
            Err(Command::Invalid(_))
        ));
    }

    #[test]
    fn mail_from_size_parameter() {
        let Command::MailFrom(_, params) = parse("MAIL FROM:<a@x.com> size=5000 BODY=8BITMIME")
        else {
            panic!("Expected MAIL FROM");
        };

        assert_eq!(params.size(), Some(5000));
        assert_eq!(params.get("body"), Some("8BITMIME"));
        assert_eq!(params.to_string(), "BODY=8BITMIME SIZE=5000");

        for bad in [
            "MAIL FROM:<a@x.com> SIZE=0",
            "MAIL FROM:<a@x.com> SIZE=",
            "MAIL FROM:<a@x.com> SIZE=abc",
            "MAIL FROM:<a@x.com> SIZE=1 SIZE=2",
        ] {
            assert!(
                matches!(Command::try_from(bad), Err(Command::Invalid(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rcpt_to_command() {
        assert_eq!(
            parse("RCPT TO:<Alice@Example.com>"),
            Command::RcptTo("Alice@Example.com".to_string())
        );
        assert_eq!(
            parse("rcpt to: bob@example.com"),
            Command::RcptTo("bob@example.com".to_string())
        );
        assert!(matches!(
            Command::try_from("RCPT TO:"),
            Err(Command::Invalid(_))
        ));
    }

    #[test]
    fn auth_command() {
        assert_eq!(
            parse("AUTH plain AGFkbWluAHNlY3JldA=="),
            Command::Auth {
                mechanism: "PLAIN".to_string(),
                initial: Some("AGFkbWluAHNlY3JldA==".to_string()),
            }
        );
        assert_eq!(
            parse("AUTH LOGIN"),
            Command::Auth {
                mechanism: "LOGIN".to_string(),
                initial: None,
            }
        );
        assert!(matches!(Command::try_from("AUTH"), Err(Command::Invalid(_))));
    }

    #[test]
    fn auth_display_hides_response() {
        assert_eq!(
            parse("AUTH PLAIN AGFkbWluAHNlY3JldA==").to_string(),
            "AUTH PLAIN ****"
        );
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(parse("VRFY root"), Command::Unknown("VRFY root".to_string()));
        assert_eq!(parse(""), Command::Unknown(String::new()));
        assert!(matches!(
            Command::try_from(&b"\xff\xfe"[..]),
            Err(Command::Unknown(_))
        ));
    }
}
