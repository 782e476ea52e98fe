use tally_core::event::{ADD_TASK_RESULT_OK, TaskEvent};
use tally_core::prefs::SortOrder;
use tally_core::session::Session;
use tally_core::task::Task;

async fn recv(session: &mut Session) -> TaskEvent {
    session.events.recv().await.expect("event queue closed")
}

#[tokio::test]
async fn filtered_sorted_list_tracks_commands_end_to_end() {
    tally_core::logging::init_tracing(0, 2).unwrap();

    let mut session = Session::in_memory();
    let coordinator = session.coordinator();

    assert!(session.tasks.next().await.unwrap().is_empty());

    coordinator.save_edit("Wash dishes", false, None).await;
    assert_eq!(recv(&mut session).await, TaskEvent::NavigateBack(ADD_TASK_RESULT_OK));
    assert_eq!(session.tasks.next().await.unwrap().len(), 1);

    coordinator.save_edit("Buy groceries", true, None).await;
    recv(&mut session).await;
    let after_second = session.tasks.next().await.unwrap();
    // Importance outranks creation order.
    assert_eq!(after_second[0].name, "Buy groceries");

    coordinator.save_edit("Prepare food", false, None).await;
    recv(&mut session).await;
    let all = session.tasks.next().await.unwrap();
    assert_eq!(all.len(), 3);

    let prepare = all
        .iter()
        .find(|t| t.name == "Prepare food")
        .cloned()
        .unwrap();
    coordinator.toggle_completed(&prepare, true).await;
    assert!(
        session
            .tasks
            .next()
            .await
            .unwrap()
            .iter()
            .any(|t| t.name == "Prepare food" && t.completed)
    );

    coordinator.hide_completed_changed(true).await;
    assert_eq!(session.tasks.next().await.unwrap().len(), 2);

    coordinator.sort_order_changed(SortOrder::ByName).await;
    let listed = session.tasks.next().await.unwrap();
    let summary: Vec<(&str, bool)> = listed
        .iter()
        .map(|t| (t.name.as_str(), t.important))
        .collect();
    assert_eq!(summary, vec![("Buy groceries", true), ("Wash dishes", false)]);

    coordinator.search_text_changed("groc");
    let searched = session.tasks.next().await.unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].name, "Buy groceries");
}

#[tokio::test]
async fn swipe_delete_then_undo_restores_the_visible_task() {
    let mut session = Session::in_memory();
    let coordinator = session.coordinator();

    coordinator.save_edit("Water plants", true, None).await;
    recv(&mut session).await;
    let task = session.tasks.next().await.unwrap().remove(0);

    coordinator.swipe_delete(task.clone()).await;
    assert!(session.tasks.next().await.unwrap().is_empty());

    let deleted = match recv(&mut session).await {
        TaskEvent::ShowUndoMessage(deleted) => deleted,
        other => panic!("expected undo message, got {other:?}"),
    };

    coordinator.undo(deleted).await;
    let restored = session.tasks.next().await.unwrap().remove(0);
    assert_eq!(restored.name, task.name);
    assert_eq!(restored.important, task.important);
    assert_eq!(restored.completed, task.completed);
    assert_eq!(restored.created, task.created);
}

#[tokio::test]
async fn tasks_and_preferences_survive_a_session_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut session = Session::open(dir.path()).unwrap();
        let coordinator = session.coordinator();

        coordinator.save_edit("Persisted", true, None).await;
        recv(&mut session).await;
        let task = session.tasks.next().await.unwrap().remove(0);

        coordinator.save_edit("Done already", false, None).await;
        recv(&mut session).await;
        let done = session
            .tasks
            .next()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.name == "Done already")
            .unwrap();
        coordinator.toggle_completed(&done, true).await;
        session.tasks.next().await.unwrap();

        coordinator.hide_completed_changed(true).await;
        session.tasks.next().await.unwrap();
        assert!(task.is_persisted());
    }

    let mut session = Session::open(dir.path()).unwrap();
    // The reopened pipeline starts from the persisted preferences, so the
    // completed task is hidden from the very first snapshot.
    let tasks = session.tasks.next().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "Persisted");
    assert!(tasks[0].important);
    assert!(!tasks[0].created_display().is_empty());
}

#[tokio::test]
async fn commands_issued_after_teardown_complete_silently() {
    let session = Session::in_memory();
    let coordinator = session.coordinator();
    drop(session);

    // Nothing to deliver to and nothing to render, but the command neither
    // panics nor blocks.
    coordinator.save_edit("Orphaned", false, None).await;
    coordinator
        .select_task(Task::new("Orphaned", false, chrono::Utc::now()))
        .await;
}
