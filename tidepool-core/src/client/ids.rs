//! Client id derivation. Every transport client gets an id derived from the
//! owning thread so broker-side logs can be traced back to a thread or task.

use crate::types::TaskId;

/// Id of the producer shared by all tasks of a thread (at-least-once).
pub fn thread_producer_client_id(thread_id: &str) -> String {
    format!("{thread_id}-producer")
}

/// Id of a task's own producer (exactly-once).
pub fn task_producer_client_id(thread_id: &str, task_id: &TaskId) -> String {
    format!("{thread_id}-{task_id}-producer")
}

pub fn consumer_client_id(thread_id: &str) -> String {
    format!("{thread_id}-consumer")
}

pub fn restore_consumer_client_id(thread_id: &str) -> String {
    format!("{thread_id}-restore-consumer")
}

pub fn global_consumer_client_id(client_id: &str) -> String {
    format!("{client_id}-global-consumer")
}

pub fn admin_client_id(client_id: &str) -> String {
    format!("{client_id}-admin")
}

/// Transactional id for a task producer; stable across restarts of the task.
pub fn transactional_id(application_id: &str, task_id: &TaskId) -> String {
    format!("{application_id}-{task_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ids() {
        let thread = "app-StreamThread-0";
        let task = TaskId::new(0, 2);
        assert_eq!(thread_producer_client_id(thread), "app-StreamThread-0-producer");
        assert_eq!(
            task_producer_client_id(thread, &task),
            "app-StreamThread-0-0_2-producer"
        );
        assert_eq!(consumer_client_id(thread), "app-StreamThread-0-consumer");
        assert_eq!(
            restore_consumer_client_id(thread),
            "app-StreamThread-0-restore-consumer"
        );
        assert_eq!(admin_client_id("app"), "app-admin");
        assert_eq!(transactional_id("app", &task), "app-0_2");
    }
}
