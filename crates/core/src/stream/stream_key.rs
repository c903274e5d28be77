/// Registry key of a stream: a signed-in user or an anonymous session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamKey {
    User(String),
    Session(String),
}

impl StreamKey {
    /// Only user streams have an identity to persist results under.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            StreamKey::User(id) => Some(id),
            StreamKey::Session(_) => None,
        }
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKey::User(id) => write!(f, "user:{id}"),
            StreamKey::Session(id) => write!(f, "session:{id}"),
        }
    }
}
