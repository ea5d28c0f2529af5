//! Opaque action tokens the transport attaches to buttons, menus and forms,
//! encoded as `<kind>_<poll id>_<rank>`.

use std::fmt::{self, Display};
use std::num::ParseIntError;
use std::str::FromStr;

const DELIMITER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SubmitModal,
    VoteSelect,
    VoteSubmit,
    Lock,
    End,
    Vote,
    Submit,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::SubmitModal,
        ActionKind::VoteSelect,
        ActionKind::VoteSubmit,
        ActionKind::Lock,
        ActionKind::End,
        ActionKind::Vote,
        ActionKind::Submit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SubmitModal => "submit-modal",
            ActionKind::VoteSelect => "vote-select",
            ActionKind::VoteSubmit => "vote-submit",
            ActionKind::Lock => "lock",
            ActionKind::End => "end",
            ActionKind::Vote => "vote",
            ActionKind::Submit => "submit",
        }
    }
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    UnknownKind(String),
    MissingPollId,
    InvalidRank(String),
}

impl Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenError::UnknownKind(kind) => write!(f, "unknown action kind: {}", kind),
            TokenError::MissingPollId => write!(f, "action token has no poll id"),
            TokenError::InvalidRank(rank) => write!(f, "invalid rank position: {}", rank),
        }
    }
}

impl std::error::Error for TokenError {}

impl FromStr for ActionKind {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TokenError::UnknownKind(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionToken {
    pub kind: ActionKind,
    pub poll_id: String,
    pub rank: usize,
}

impl ActionToken {
    pub fn new(kind: ActionKind, poll_id: &str) -> ActionToken {
        ActionToken { kind, poll_id: poll_id.to_owned(), rank: 0 }
    }

    pub fn with_rank(kind: ActionKind, poll_id: &str, rank: usize) -> ActionToken {
        ActionToken { kind, poll_id: poll_id.to_owned(), rank }
    }
}

impl Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}{}{}", self.kind, DELIMITER, self.poll_id, DELIMITER, self.rank)
    }
}

impl FromStr for ActionToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.splitn(3, DELIMITER);
        let kind: ActionKind = fields.next().unwrap_or_default().parse()?;
        let poll_id = match fields.next() {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => return Err(TokenError::MissingPollId),
        };
        let rank: usize = match fields.next() {
            Some(rank) => rank.parse().map_err(|_: ParseIntError| TokenError::InvalidRank(rank.to_owned()))?,
            None => 0,
        };
        Ok(ActionToken { kind, poll_id, rank })
    }
}
