use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Root segment of every thread path in the realtime tree.
pub const THREADS_ROOT: &str = "Threads";

const SUPPORT_TAG: &str = "support";
const USER_PREFIX: &str = "u:";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarId(String);

impl CarId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CarId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One side of a conversation. Support staff act as a single desk identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Participant {
    User(UserId),
    SupportDesk,
}

impl Participant {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(UserId::new(id))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::SupportDesk => None,
        }
    }

    pub fn is_support(&self) -> bool {
        matches!(self, Self::SupportDesk)
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{}{}", USER_PREFIX, id),
            Self::SupportDesk => f.write_str(SUPPORT_TAG),
        }
    }
}

impl FromStr for Participant {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == SUPPORT_TAG {
            return Ok(Self::SupportDesk);
        }
        match value.strip_prefix(USER_PREFIX) {
            Some(id) if !id.is_empty() => Ok(Self::user(id)),
            _ => Err(ParseError::Participant(value.to_string())),
        }
    }
}

impl From<Participant> for String {
    fn from(value: Participant) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Participant {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }
}

/// Who a thread hangs off in the tree: a seller's listing, or one of the
/// two support sub-partitions (buyers talking to support, sellers talking to support).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ThreadOwner {
    Seller(UserId),
    Support(Role),
}

impl fmt::Display for ThreadOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seller(id) => write!(f, "{}", id),
            Self::Support(role) => write!(f, "{}:{}", SUPPORT_TAG, role.as_str()),
        }
    }
}

impl FromStr for ThreadOwner {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Some(role) = value.strip_prefix("support:") {
            return match role {
                "buyer" => Ok(Self::Support(Role::Buyer)),
                "seller" => Ok(Self::Support(Role::Seller)),
                _ => Err(ParseError::ThreadOwner(value.to_string())),
            };
        }
        if value.is_empty() || value.contains('/') {
            return Err(ParseError::ThreadOwner(value.to_string()));
        }
        Ok(Self::Seller(UserId::new(value)))
    }
}

impl From<ThreadOwner> for String {
    fn from(value: ThreadOwner) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ThreadOwner {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Identifies one message log: `Threads/{owner}/{carId}/messages/{memberId}`.
///
/// `member_id` is the buyer in a seller thread, or the user (buyer or seller)
/// talking to the support desk in a support thread.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ThreadKey {
    pub owner: ThreadOwner,
    pub car_id: CarId,
    pub member_id: UserId,
}

impl ThreadKey {
    /// Every id becomes one segment of `path()`, so none may be empty or
    /// contain `/`.
    pub fn new(owner: ThreadOwner, car_id: CarId, member_id: UserId) -> Result<Self, ParseError> {
        if let ThreadOwner::Seller(seller) = &owner {
            check_segment(seller.as_str())?;
        }
        check_segment(car_id.as_str())?;
        check_segment(member_id.as_str())?;
        Ok(Self { owner, car_id, member_id })
    }

    /// Buyer ↔ seller thread about one car.
    pub fn direct(
        seller: impl Into<String>,
        car_id: impl Into<String>,
        buyer: impl Into<String>,
    ) -> Result<Self, ParseError> {
        Self::new(
            ThreadOwner::Seller(UserId::new(seller)),
            CarId::new(car_id),
            UserId::new(buyer),
        )
    }

    /// Buyer ↔ support or seller ↔ support thread about one car.
    pub fn support(side: Role, car_id: impl Into<String>, member: impl Into<String>) -> Result<Self, ParseError> {
        Self::new(ThreadOwner::Support(side), CarId::new(car_id), UserId::new(member))
    }

    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/messages/{}",
            THREADS_ROOT, self.owner, self.car_id, self.member_id
        )
    }

    pub fn participants(&self) -> [Participant; 2] {
        let member = Participant::User(self.member_id.clone());
        match &self.owner {
            ThreadOwner::Seller(seller) => [Participant::User(seller.clone()), member],
            ThreadOwner::Support(_) => [Participant::SupportDesk, member],
        }
    }

    pub fn is_member(&self, participant: &Participant) -> bool {
        self.participants().contains(participant)
    }

    /// The other party of the thread, or `None` if `participant` is not a member
    /// or the thread degenerately pairs a user with themselves.
    pub fn counterpart(&self, participant: &Participant) -> Option<Participant> {
        let [first, second] = self.participants();
        if first == second {
            return None;
        }
        if *participant == first {
            Some(second)
        } else if *participant == second {
            Some(first)
        } else {
            None
        }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for ThreadKey {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::ThreadPath(value.to_string());
        let parts: Vec<&str> = value.split('/').collect();
        match parts.as_slice() {
            [root, owner, car, "messages", member]
                if *root == THREADS_ROOT && !car.is_empty() && !member.is_empty() =>
            {
                let owner = owner.parse::<ThreadOwner>().map_err(|_| invalid())?;
                Self::new(owner, CarId::new(*car), UserId::new(*member)).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

fn check_segment(value: &str) -> Result<(), ParseError> {
    if value.is_empty() || value.contains('/') {
        return Err(ParseError::Segment(value.to_string()));
    }
    Ok(())
}

impl From<ThreadKey> for String {
    fn from(value: ThreadKey) -> Self {
        value.path()
    }
}

impl TryFrom<String> for ThreadKey {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
