use anyhow::Result;
use teloxide::types::User;

use crate::identity::BotIdentity;
use crate::qa::QaService;

/// An outbound reply computed by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Render with Telegram's Markdown parse mode.
    pub markdown: bool,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
        }
    }

    fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
        }
    }
}

/// Reply to a join event. Only the first joined member is considered,
/// regardless of how many joined in one update.
///
/// When the bot itself is the first joined member (it was added to the
/// group), the reply is the configured greeting. Otherwise the new member
/// is welcomed by username if they have one, by full name if not.
pub fn welcome_reply(identity: &BotIdentity, joined: &[User]) -> Option<Reply> {
    let member = joined.first()?;

    if member.id == identity.user_id {
        return Some(Reply::plain(identity.greeting.clone()));
    }

    let text = match &member.username {
        Some(username) => format!("Welcome @{username} to the group!"),
        None => format!("Welcome {} to the group!", member.full_name()),
    };
    Some(Reply::plain(text))
}

/// Reply to a member leaving the chat.
pub fn farewell_reply(member: &User) -> Reply {
    Reply::plain(format!("{} has left the group.", member.first_name))
}

/// Reply to the /start command.
pub fn start_reply(identity: &BotIdentity) -> Reply {
    Reply::plain(identity.greeting.clone())
}

/// The command pattern matches anywhere in the text, not just at the start.
pub fn is_start_command(text: &str) -> bool {
    text.contains("/start")
}

/// Forward a question verbatim to the QA collaborator and wrap its answer
/// in a Markdown-rendered reply.
pub async fn answer_reply(qa: &dyn QaService, question: &str) -> Result<Reply> {
    let answer = qa.ask(question).await?;
    Ok(Reply::markdown(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use teloxide::types::UserId;

    fn make_user(id: u64, first: &str, last: Option<&str>, username: Option<&str>) -> User {
        User {
            id: UserId(id),
            is_bot: false,
            first_name: first.to_string(),
            last_name: last.map(str::to_string),
            username: username.map(str::to_string),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    fn identity() -> BotIdentity {
        BotIdentity::from_token("12345:ABC-secret", "Hello! Ask me anything.".to_string())
            .unwrap()
    }

    struct RecordingQa {
        asked: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingQa {
        fn new(fail: bool) -> Self {
            Self {
                asked: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl QaService for RecordingQa {
        async fn ask(&self, question: &str) -> Result<String> {
            self.asked.lock().unwrap().push(question.to_string());
            if self.fail {
                anyhow::bail!("qa backend unavailable");
            }
            Ok(format!("answer to: {question}"))
        }
    }

    #[test]
    fn test_bot_joining_sends_greeting_verbatim() {
        let bot_member = make_user(12345, "AskBot", None, Some("askbot"));
        let other = make_user(999, "Ana", None, Some("ana99"));

        let reply = welcome_reply(&identity(), &[bot_member, other]).unwrap();
        assert_eq!(reply.text, "Hello! Ask me anything.");
        assert!(!reply.markdown);
    }

    #[test]
    fn test_member_with_username_welcomed_by_username() {
        let member = make_user(999, "Ana", Some("Lima"), Some("ana99"));

        let reply = welcome_reply(&identity(), &[member]).unwrap();
        assert_eq!(reply.text, "Welcome @ana99 to the group!");
    }

    #[test]
    fn test_member_without_username_welcomed_by_full_name() {
        let member = make_user(999, "Ana", Some("Lima"), None);

        let reply = welcome_reply(&identity(), &[member]).unwrap();
        assert_eq!(reply.text, "Welcome Ana Lima to the group!");
    }

    #[test]
    fn test_member_without_last_name_welcomed_by_first_name() {
        let member = make_user(999, "Ana", None, None);

        let reply = welcome_reply(&identity(), &[member]).unwrap();
        assert_eq!(reply.text, "Welcome Ana to the group!");
    }

    #[test]
    fn test_only_first_joined_member_is_welcomed() {
        let first = make_user(7, "Bea", None, Some("bea"));
        let second = make_user(8, "Carl", None, Some("carl"));

        let reply = welcome_reply(&identity(), &[first, second]).unwrap();
        assert_eq!(reply.text, "Welcome @bea to the group!");
    }

    #[test]
    fn test_empty_join_list_produces_no_reply() {
        assert_eq!(welcome_reply(&identity(), &[]), None);
    }

    #[test]
    fn test_farewell_uses_first_name() {
        let member = make_user(999, "Ana", Some("Lima"), Some("ana99"));
        assert_eq!(farewell_reply(&member).text, "Ana has left the group.");
    }

    #[test]
    fn test_start_reply_is_greeting() {
        let reply = start_reply(&identity());
        assert_eq!(reply.text, "Hello! Ask me anything.");
        assert!(!reply.markdown);
    }

    #[test]
    fn test_start_command_matches_anywhere() {
        assert!(is_start_command("/start"));
        assert!(is_start_command("/start now"));
        assert!(is_start_command("please /start"));
        assert!(!is_start_command("start"));
        assert!(!is_start_command("what is rust?"));
    }

    #[tokio::test]
    async fn test_answer_forwards_question_verbatim() {
        let qa = RecordingQa::new(false);

        let reply = answer_reply(&qa, "what is rust?").await.unwrap();
        assert_eq!(reply.text, "answer to: what is rust?");
        assert!(reply.markdown);
        assert_eq!(*qa.asked.lock().unwrap(), vec!["what is rust?".to_string()]);
    }

    #[tokio::test]
    async fn test_answer_propagates_collaborator_failure() {
        let qa = RecordingQa::new(true);

        let err = answer_reply(&qa, "anything").await.unwrap_err();
        assert!(err.to_string().contains("qa backend unavailable"));
    }
}
