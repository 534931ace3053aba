#[cfg(test)]
mod tests {
    use crate::db::{get_conversation, list_conversations, send_message};
    use crate::test::test_utils::{INSTRUCTOR, MEMBER, NEWCOMER, create_standard_test_db};
    use rocket::tokio;

    #[tokio::test]
    async fn test_conversations_show_latest_message_per_partner() {
        let db = create_standard_test_db().await;

        send_message(&db.pool, MEMBER, INSTRUCTOR, "Hi Ian", "text").await.unwrap();
        send_message(&db.pool, INSTRUCTOR, MEMBER, "Hello Sam", "text").await.unwrap();
        send_message(&db.pool, NEWCOMER, MEMBER, "Are you at DriveRight?", "text")
            .await
            .unwrap();

        let conversations = list_conversations(&db.pool, MEMBER).await.unwrap();
        assert_eq!(conversations.len(), 2);

        let with_ian = conversations
            .iter()
            .find(|c| c.partner_email == INSTRUCTOR)
            .expect("conversation with instructor");
        assert_eq!(with_ian.last_message, "Hello Sam");

        let with_nina = conversations
            .iter()
            .find(|c| c.partner_email == NEWCOMER)
            .expect("conversation with newcomer");
        assert_eq!(with_nina.last_message, "Are you at DriveRight?");
    }

    #[tokio::test]
    async fn test_reading_conversation_marks_received_read() {
        let db = create_standard_test_db().await;

        send_message(&db.pool, MEMBER, INSTRUCTOR, "First", "text").await.unwrap();
        send_message(&db.pool, INSTRUCTOR, MEMBER, "Second", "text").await.unwrap();

        let messages = get_conversation(&db.pool, MEMBER, INSTRUCTOR).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "First");
        assert_eq!(messages[1].message, "Second");
        assert!(!messages[0].read);
        assert!(messages[1].read);

        let third_party = get_conversation(&db.pool, NEWCOMER, MEMBER).await.unwrap();
        assert!(third_party.is_empty());
    }
}
