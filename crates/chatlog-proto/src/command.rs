//! Bot command parsing.
//!
//! A command is a message whose text starts with `/`, optionally addressed
//! to a specific bot with `@botname`, followed by free-form arguments:
//!
//! ```text
//! /ban@archive_bot @someone
//! ```

/// A parsed `/command[@bot] [args]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand<'a> {
    /// Command name without the slash, lowercased.
    pub name: String,
    /// Bot username the command was addressed to, if any.
    pub mention: Option<&'a str>,
    /// Everything after the command word, trimmed.
    pub args: &'a str,
}

impl<'a> BotCommand<'a> {
    /// Parse a command from message text.
    ///
    /// Returns `None` when the text is not a command.
    pub fn parse(text: &'a str) -> Option<Self> {
        let rest = text.strip_prefix('/')?;
        let (word, args) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };

        let (name, mention) = match word.split_once('@') {
            Some((name, bot)) => (name, Some(bot).filter(|b| !b.is_empty())),
            None => (word, None),
        };
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_ascii_lowercase(),
            mention,
            args,
        })
    }

    /// Whether the command may be handled by the bot called `bot_username`.
    ///
    /// Unaddressed commands are accepted by every bot in the chat.
    pub fn is_for(&self, bot_username: &str) -> bool {
        match self.mention {
            Some(mention) => mention.eq_ignore_ascii_case(bot_username),
            None => true,
        }
    }

    /// Arguments split on whitespace.
    pub fn arg_words(&self) -> impl Iterator<Item = &'a str> {
        self.args.split_whitespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_command() {
        let cmd = BotCommand::parse("/ping").unwrap();
        assert_eq!(cmd.name, "ping");
        assert_eq!(cmd.mention, None);
        assert_eq!(cmd.args, "");
    }

    #[test]
    fn addressed_command_with_args() {
        let cmd = BotCommand::parse("/Ban@Archive_Bot   @mallory  ").unwrap();
        assert_eq!(cmd.name, "ban");
        assert_eq!(cmd.mention, Some("Archive_Bot"));
        assert_eq!(cmd.args, "@mallory");
        assert!(cmd.is_for("archive_bot"));
        assert!(!cmd.is_for("other_bot"));
    }

    #[test]
    fn multiline_args_are_kept() {
        let cmd = BotCommand::parse("/dnf info\nbash").unwrap();
        assert_eq!(cmd.name, "dnf");
        assert_eq!(cmd.arg_words().collect::<Vec<_>>(), vec!["info", "bash"]);
    }

    #[test]
    fn not_a_command() {
        assert!(BotCommand::parse("hello /ping").is_none());
        assert!(BotCommand::parse("/").is_none());
        assert!(BotCommand::parse("/@bot").is_none());
    }
}
