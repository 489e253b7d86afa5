/// Access rules for the shared room document.
///
/// Membership is the only authorization concept: a room is jointly owned by
/// its (at most two) recorded members. The one exception is the hardcoded
/// legacy room, which predates membership entirely and stays writable by
/// anyone so the original fixed-room deployment keeps working.

use duo_types::codes::LEGACY_ROOM_CODE;
use duo_types::models::RoomDoc;

pub fn can_write(code: &str, doc: &RoomDoc, who: &str) -> bool {
    code == LEGACY_ROOM_CODE || doc.is_member(who)
}

/// Reading (and subscribing) is slightly looser than writing: a missing
/// document may be read by anyone (that is the creation path), and documents
/// with an empty membership map predate the membership model and stay
/// readable.
pub fn can_read(code: &str, doc: Option<&RoomDoc>, who: &str) -> bool {
    match doc {
        None => true,
        Some(doc) => {
            code == LEGACY_ROOM_CODE || doc.members.is_empty() || doc.is_member(who)
        }
    }
}

/// Self-registration into the membership map: open until both seats are
/// taken.
pub fn can_join(doc: &RoomDoc, who: &str) -> bool {
    doc.is_member(who) || doc.member_count() < 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use duo_types::mutations::register_member;

    #[test]
    fn test_write_requires_membership() {
        let doc = register_member(RoomDoc::default(), "lea");
        assert!(can_write("abcd2345", &doc, "lea"));
        assert!(!can_write("abcd2345", &doc, "intruder"));
    }

    #[test]
    fn test_legacy_room_is_open() {
        let doc = RoomDoc::default();
        assert!(can_write(LEGACY_ROOM_CODE, &doc, "anyone"));
        assert!(can_read(LEGACY_ROOM_CODE, Some(&doc), "anyone"));
    }

    #[test]
    fn test_join_caps_at_two_members() {
        let doc = register_member(RoomDoc::default(), "lea");
        assert!(can_join(&doc, "gauthier"));
        let doc = register_member(doc, "gauthier");
        assert!(!can_join(&doc, "third-wheel"));
        // Existing members can always re-join (idempotent).
        assert!(can_join(&doc, "lea"));
    }

    #[test]
    fn test_pre_membership_docs_stay_readable() {
        let doc = RoomDoc::default();
        assert!(can_read("abcd2345", Some(&doc), "anyone"));
        let doc = register_member(doc, "lea");
        assert!(!can_read("abcd2345", Some(&doc), "anyone"));
        assert!(can_read("abcd2345", None, "anyone"));
    }
}
