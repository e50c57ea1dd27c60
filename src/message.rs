use serde::{Deserialize, Serialize};

/// One turn message in a conversation: a role tag plus text content.
///
/// Messages form the append-only conversation history channel. Each
/// message carries a role (`"human"`, `"assistant"`, or `"system"`) and
/// the utterance text. Nodes append messages; they never rewrite history.
///
/// # Examples
///
/// ```
/// use tutorgraph::message::Message;
///
/// let question = Message::human("Explain recursion");
/// let reply = Message::assistant("Think of a function that calls itself...");
/// let framing = Message::system("You are a patient tutor.");
///
/// assert!(question.has_role(Message::HUMAN));
/// assert_eq!(reply.role, "assistant");
/// # let _ = framing;
/// ```
///
/// # Serialization
///
/// Messages serialize as plain `{role, content}` objects so checkpoints
/// and streamed events stay self-describing:
///
/// ```
/// use tutorgraph::message::Message;
///
/// let msg = Message::human("What is a base case?");
/// let json = serde_json::to_string(&msg).unwrap();
/// let parsed: Message = serde_json::from_str(&json).unwrap();
/// assert_eq!(msg, parsed);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    ///
    /// Use the constants on [`Message`] for standardized values.
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// Human (learner) input message role.
    pub const HUMAN: &'static str = "human";
    /// Tutor/assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with the specified role and content.
    ///
    /// # Examples
    /// ```
    /// use tutorgraph::message::Message;
    ///
    /// let msg = Message::new(Message::HUMAN, "Explain recursion");
    /// assert_eq!(msg.role, "human");
    /// ```
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a human message with the specified content.
    #[must_use]
    pub fn human(content: &str) -> Self {
        Self::new(Self::HUMAN, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    ///
    /// # Examples
    /// ```
    /// use tutorgraph::message::Message;
    ///
    /// let msg = Message::human("hello");
    /// assert!(msg.has_role(Message::HUMAN));
    /// assert!(!msg.has_role(Message::ASSISTANT));
    /// ```
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Verifies the convenience constructors set role and content correctly.
    fn test_convenience_constructors() {
        let human = Message::human("Explain recursion");
        assert_eq!(human.role, Message::HUMAN);
        assert_eq!(human.content, "Explain recursion");

        let assistant = Message::assistant("A function that calls itself.");
        assert_eq!(assistant.role, Message::ASSISTANT);

        let system = Message::system("You are a patient tutor.");
        assert_eq!(system.role, Message::SYSTEM);

        let custom = Message::new("tool", "lookup: ok");
        assert_eq!(custom.role, "tool");
        assert_eq!(custom.content, "lookup: ok");
    }

    #[test]
    /// Validates equality semantics across differing roles and content.
    fn test_message_equality() {
        let a = Message::human("hi");
        let b = Message::human("hi");
        let c = Message::assistant("hi");
        let d = Message::human("bye");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    /// Tests role checking against the standard constants.
    fn test_role_checking() {
        let msg = Message::assistant("feedback");
        assert!(msg.has_role(Message::ASSISTANT));
        assert!(!msg.has_role(Message::HUMAN));
        assert!(!msg.has_role(Message::SYSTEM));
    }

    #[test]
    /// Tests serialization round-trips preserve both fields.
    fn test_serialization() {
        let original = Message::human("What is a base case?");
        let json = serde_json::to_string(&original).expect("serialization failed");
        let parsed: Message = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(original, parsed);
        assert_eq!(parsed.role, "human");
    }
}
