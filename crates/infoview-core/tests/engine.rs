use infoview_core::{
    ActiveCursor, BackendError, ConfigPatch, DiagnosticMessage, DisplayMode, DocumentSelector,
    EditorHost, FetchTicket, InfoBackend, InfoProvider, InfoRecord, InfoSnapshot, InfoviewCommand,
    InfoviewError, Location, Position, Severity, ToInfoviewMessage,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeEditor {
    cursor: Option<ActiveCursor>,
    revealed: Vec<(String, Position)>,
    hovered: Vec<(String, Position)>,
    hover_cleared: usize,
    inserted: Vec<(String, usize, String)>,
}

impl FakeEditor {
    fn at(file_name: &str, line: usize, column: usize) -> Self {
        let mut editor = Self::default();
        editor.move_to(file_name, line, column);
        editor
    }

    fn move_to(&mut self, file_name: &str, line: usize, column: usize) {
        self.cursor = Some(ActiveCursor {
            file_name: file_name.to_string(),
            language_id: "lean".to_string(),
            position: Position::new(line, column),
        });
    }
}

impl EditorHost for FakeEditor {
    fn active_cursor(&self) -> Option<ActiveCursor> {
        self.cursor.clone()
    }

    fn reveal_position(&mut self, file_name: &str, position: Position) {
        self.revealed.push((file_name.to_string(), position));
    }

    fn hover_position(&mut self, file_name: &str, position: Position) {
        self.hovered.push((file_name.to_string(), position));
    }

    fn stop_hover(&mut self) {
        self.hover_cleared += 1;
    }

    fn insert_text(&mut self, file_name: &str, line: usize, text: &str) {
        self.inserted
            .push((file_name.to_string(), line, text.to_string()));
    }
}

#[derive(Default)]
struct FakeBackend {
    requests: Vec<(FetchTicket, Location)>,
    cancelled: Vec<FetchTicket>,
    refuse: bool,
}

impl FakeBackend {
    fn last_ticket(&self) -> FetchTicket {
        self.requests.last().map(|(t, _)| *t).unwrap()
    }
}

impl InfoBackend for FakeBackend {
    fn request_info(
        &mut self,
        ticket: FetchTicket,
        location: &Location,
    ) -> Result<(), BackendError> {
        if self.refuse {
            return Err(BackendError::Disconnected);
        }
        self.requests.push((ticket, location.clone()));
        Ok(())
    }

    fn cancel_info(&mut self, ticket: FetchTicket) {
        self.cancelled.push(ticket);
    }
}

struct Harness {
    provider: InfoProvider<FakeEditor, FakeBackend>,
    redraws: Arc<Mutex<Vec<InfoSnapshot>>>,
    posts: Arc<Mutex<Vec<ToInfoviewMessage>>>,
}

impl Harness {
    fn new(editor: FakeEditor) -> Self {
        let provider = InfoProvider::new(
            editor,
            FakeBackend::default(),
            DocumentSelector::language("lean"),
        );

        let redraws = Arc::new(Mutex::new(Vec::new()));
        let redraws_clone = Arc::clone(&redraws);
        provider.redraw_event().subscribe(move |snapshot: &InfoSnapshot| {
            redraws_clone.lock().unwrap().push(snapshot.clone());
        });

        let posts = Arc::new(Mutex::new(Vec::new()));
        let posts_clone = Arc::clone(&posts);
        provider.post_event().subscribe(move |msg: &ToInfoviewMessage| {
            posts_clone.lock().unwrap().push(msg.clone());
        });

        Self {
            provider,
            redraws,
            posts,
        }
    }

    fn redraw_count(&self) -> usize {
        self.redraws.lock().unwrap().len()
    }

    fn last_redraw(&self) -> InfoSnapshot {
        self.redraws.lock().unwrap().last().cloned().unwrap()
    }

    fn posts(&self) -> Vec<ToInfoviewMessage> {
        self.posts.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.redraws.lock().unwrap().clear();
        self.posts.lock().unwrap().clear();
    }

    fn respond(&mut self, state: Option<&str>) -> infoview_core::Result<()> {
        let ticket = self.provider.backend().last_ticket();
        let record = state.map(|s| InfoRecord {
            state: Some(s.to_string()),
            ..InfoRecord::default()
        });
        self.provider.on_info_response(ticket, Ok(record))
    }

    /// Switch to goal mode and answer the first fetch with `goal`.
    fn show_goal(&mut self, goal: &str) {
        self.provider.set_mode(DisplayMode::OnlyState).unwrap();
        self.respond(Some(goal)).unwrap();
        assert_eq!(self.provider.state().cur_goal_state.as_deref(), Some(goal));
        self.clear();
    }
}

fn error_at(line: usize, col: usize) -> DiagnosticMessage {
    DiagnosticMessage::new("/a.lean", line, col, Severity::Error, "", "unknown identifier")
}

#[test]
fn test_set_same_mode_twice_refreshes_once() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));

    h.provider.set_mode(DisplayMode::OnlyState).unwrap();
    h.respond(Some("⊢ P")).unwrap();
    h.provider.set_mode(DisplayMode::OnlyState).unwrap();

    assert_eq!(h.provider.backend().requests.len(), 1);
    assert_eq!(h.redraw_count(), 1);
}

#[test]
fn test_set_active_mode_while_running_is_noop() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.set_mode(DisplayMode::AllMessages).unwrap();

    assert_eq!(h.redraw_count(), 0);
    assert!(h.posts().is_empty());
    assert_eq!(h.provider.state().cur_file, None);
}

#[test]
fn test_pause_blocks_moves_and_continue_redraws_once() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.on_selection_changed().unwrap();
    assert_eq!(h.redraw_count(), 1);
    h.clear();

    h.provider.pause();
    assert_eq!(h.posts(), vec![ToInfoviewMessage::Pause]);

    h.provider.editor_mut().move_to("/a.lean", 7, 1);
    h.provider.on_selection_changed().unwrap();
    h.provider.editor_mut().move_to("/a.lean", 2, 5);
    h.provider.on_selection_changed().unwrap();
    h.provider.on_diagnostics(vec![error_at(3, 0)]).unwrap();
    assert_eq!(h.redraw_count(), 0);
    assert_eq!(h.provider.state().cur_position, Some(Position::new(2, 5)));

    h.provider.resume().unwrap();
    assert_eq!(h.redraw_count(), 1);
    assert!(!h.last_redraw().stopped);
    assert_eq!(h.last_redraw().messages, vec![error_at(3, 0)]);
}

#[test]
fn test_pause_in_goal_mode_issues_no_fetch() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.show_goal("⊢ P");

    h.provider.pause();
    h.provider.editor_mut().move_to("/a.lean", 4, 0);
    h.provider.on_selection_changed().unwrap();
    h.provider.on_status_changed().unwrap();
    assert_eq!(h.provider.backend().requests.len(), 1);

    h.provider.editor_mut().move_to("/a.lean", 2, 5);
    h.provider.resume().unwrap();
    assert_eq!(h.provider.backend().requests.len(), 2);
    h.respond(Some("⊢ P")).unwrap();
    assert_eq!(h.redraw_count(), 1);
}

#[test]
fn test_goal_fetch_changed_then_unchanged() {
    let mut h = Harness::new(FakeEditor::at("/A.lean", 2, 5));

    h.provider.set_mode(DisplayMode::OnlyState).unwrap();
    let (_, location) = h.provider.backend().requests[0].clone();
    assert_eq!(location, Location::new("/A.lean", 3, 5));

    h.respond(Some("⊢ P")).unwrap();
    assert_eq!(h.redraw_count(), 1);
    assert_eq!(h.last_redraw().goal_state.as_deref(), Some("⊢ P"));
    h.clear();

    h.provider.on_status_changed().unwrap();
    h.respond(Some("⊢ P")).unwrap();
    assert_eq!(h.redraw_count(), 0);
    assert!(h.posts().is_empty());
}

#[test]
fn test_status_change_ignored_outside_goal_mode() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.on_selection_changed().unwrap();
    h.provider.on_status_changed().unwrap();
    assert!(h.provider.backend().requests.is_empty());
}

#[test]
fn test_new_diagnostics_in_all_messages_redraw() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 0, 0));
    h.provider.on_selection_changed().unwrap();
    h.clear();

    h.provider.on_diagnostics(Vec::new()).unwrap();
    assert_eq!(h.redraw_count(), 0);

    h.provider.on_diagnostics(vec![error_at(3, 0)]).unwrap();
    assert_eq!(h.redraw_count(), 1);
    assert_eq!(h.last_redraw().messages, vec![error_at(3, 0)]);

    h.provider.on_diagnostics(vec![error_at(3, 0)]).unwrap();
    assert_eq!(h.redraw_count(), 1);
}

#[test]
fn test_cursor_move_in_all_messages_posts_position() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 0, 0));
    h.provider.on_selection_changed().unwrap();
    h.clear();

    h.provider.editor_mut().move_to("/a.lean", 4, 2);
    h.provider.on_selection_changed().unwrap();
    assert_eq!(h.redraw_count(), 0);
    assert_eq!(
        h.posts(),
        vec![ToInfoviewMessage::Position(Location::new("/a.lean", 5, 2))]
    );

    h.provider.on_selection_changed().unwrap();
    assert_eq!(h.posts().len(), 1);
}

#[test]
fn test_unmatched_document_is_ignored() {
    let mut h = Harness::new(FakeEditor::default());
    h.provider.editor_mut().cursor = Some(ActiveCursor {
        file_name: "/notes.txt".to_string(),
        language_id: "plaintext".to_string(),
        position: Position::new(1, 1),
    });
    h.provider.on_selection_changed().unwrap();

    assert_eq!(h.provider.state().cur_file, None);
    assert_eq!(h.redraw_count(), 0);
    assert!(h.posts().is_empty());
}

#[test]
fn test_stale_ticket_is_dropped() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.set_mode(DisplayMode::OnlyState).unwrap();
    let first = h.provider.backend().last_ticket();

    h.provider.editor_mut().move_to("/a.lean", 6, 0);
    h.provider.on_selection_changed().unwrap();
    let second = h.provider.backend().last_ticket();
    assert!(second > first);
    assert_eq!(h.provider.backend().cancelled, vec![first]);

    h.provider
        .on_info_response(
            first,
            Ok(Some(InfoRecord {
                state: Some("old".to_string()),
                ..InfoRecord::default()
            })),
        )
        .unwrap();
    assert_eq!(h.redraw_count(), 0);
    assert_eq!(h.provider.state().cur_goal_state, None);

    h.respond(Some("new")).unwrap();
    assert_eq!(h.redraw_count(), 1);
    let snapshot = h.last_redraw();
    assert_eq!(snapshot.goal_state.as_deref(), Some("new"));
    assert_eq!(snapshot.location, Some(Location::new("/a.lean", 7, 0)));
}

#[test]
fn test_superseded_fetch_keeps_its_redraw() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.set_mode(DisplayMode::OnlyState).unwrap();
    h.provider.on_status_changed().unwrap();
    assert_eq!(h.provider.backend().requests.len(), 2);

    h.respond(None).unwrap();
    assert_eq!(h.redraw_count(), 1);
    assert_eq!(h.provider.pending_ticket(), None);
}

#[test]
fn test_clearing_goal_is_a_change() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.show_goal("⊢ P");

    h.provider.on_status_changed().unwrap();
    h.respond(None).unwrap();
    assert_eq!(h.redraw_count(), 1);
    assert_eq!(h.last_redraw().goal_state, None);

    h.provider.on_status_changed().unwrap();
    h.respond(None).unwrap();
    assert_eq!(h.redraw_count(), 1);
}

#[test]
fn test_failed_fetch_preserves_state() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.show_goal("⊢ P");

    h.provider.on_status_changed().unwrap();
    let ticket = h.provider.backend().last_ticket();
    let err = h
        .provider
        .on_info_response(ticket, Err(BackendError::Timeout))
        .unwrap_err();

    assert!(matches!(err, InfoviewError::Backend(BackendError::Timeout)));
    assert_eq!(h.provider.state().cur_goal_state.as_deref(), Some("⊢ P"));
    assert_eq!(h.provider.pending_ticket(), None);
    assert_eq!(h.redraw_count(), 0);
}

#[test]
fn test_refused_request_is_reported() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.backend_mut().refuse = true;

    let err = h.provider.set_mode(DisplayMode::OnlyState).unwrap_err();
    assert!(matches!(err, InfoviewError::Backend(BackendError::Disconnected)));
    assert_eq!(h.provider.pending_ticket(), None);
}

#[test]
fn test_forced_refresh_without_change_posts_continue() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.show_goal("⊢ P");

    h.provider.refresh().unwrap();
    h.respond(Some("⊢ P")).unwrap();
    assert_eq!(h.redraw_count(), 0);
    assert_eq!(h.posts(), vec![ToInfoviewMessage::Continue]);
}

#[test]
fn test_toggle_updating() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.on_selection_changed().unwrap();
    h.clear();

    h.provider.execute(InfoviewCommand::ToggleUpdating).unwrap();
    assert!(h.provider.state().stopped);
    h.provider.execute(InfoviewCommand::ToggleUpdating).unwrap();
    assert!(!h.provider.state().stopped);

    assert_eq!(h.posts(), vec![ToInfoviewMessage::Pause]);
    assert_eq!(h.redraw_count(), 1);
}

#[test]
fn test_editor_commands() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));

    h.provider
        .execute(InfoviewCommand::RevealPosition {
            file_name: "/b.lean".to_string(),
            line: 10,
            column: 4,
        })
        .unwrap();
    h.provider
        .execute(InfoviewCommand::HoverPosition {
            file_name: "/b.lean".to_string(),
            line: 1,
            column: 0,
        })
        .unwrap();
    h.provider.execute(InfoviewCommand::StopHover).unwrap();

    let editor = h.provider.editor();
    assert_eq!(
        editor.revealed,
        vec![("/b.lean".to_string(), Position::new(9, 4))]
    );
    assert_eq!(
        editor.hovered,
        vec![("/b.lean".to_string(), Position::new(0, 0))]
    );
    assert_eq!(editor.hover_cleared, 1);
}

#[test]
fn test_copy_to_comment() {
    let mut h = Harness::new(FakeEditor::at("/src/a.lean", 2, 5));
    h.show_goal("⊢ P");

    h.provider.execute(InfoviewCommand::CopyToComment).unwrap();
    assert_eq!(
        h.provider.editor().inserted,
        vec![(
            "/src/a.lean".to_string(),
            3,
            "/-\nTactic State:\n⊢ P\n\n-/\n".to_string()
        )]
    );
}

#[test]
fn test_config_change_redraws_and_recomputes() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 7));
    h.provider
        .on_diagnostics(vec![error_at(3, 2), error_at(3, 5), error_at(3, 9)])
        .unwrap();
    h.show_goal("⊢ P");
    assert_eq!(
        h.provider.snapshot().messages,
        vec![error_at(3, 5), error_at(3, 9)]
    );

    h.provider.on_config_change(ConfigPatch {
        all_errors_on_line: Some(true),
        ..ConfigPatch::default()
    });
    assert!(h.provider.config().all_errors_on_line);
    assert_eq!(h.redraw_count(), 1);
    assert_eq!(
        h.last_redraw().messages,
        vec![error_at(3, 2), error_at(3, 5), error_at(3, 9)]
    );
}

#[test]
fn test_dispose_stops_publishing() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.on_config_change(ConfigPatch {
        font_size: Some(20),
        ..ConfigPatch::default()
    });
    h.clear();

    h.provider.dispose();
    assert_eq!(h.provider.config().font_size, 14);

    h.provider.on_selection_changed().unwrap();
    assert_eq!(h.redraw_count(), 0);
    assert!(h.posts().is_empty());
}

#[test]
fn test_switch_to_all_messages_cancels_goal_fetch() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.set_mode(DisplayMode::OnlyState).unwrap();
    let ticket = h.provider.backend().last_ticket();

    h.provider.set_mode(DisplayMode::AllMessages).unwrap();
    assert_eq!(h.redraw_count(), 1);
    assert_eq!(h.provider.pending_ticket(), None);
    assert_eq!(h.provider.backend().cancelled, vec![ticket]);

    let late = InfoRecord {
        state: Some("⊢ P".to_string()),
        ..InfoRecord::default()
    };
    h.provider.on_info_response(ticket, Ok(Some(late))).unwrap();
    assert_eq!(h.redraw_count(), 1);
    assert_eq!(h.provider.state().cur_goal_state, None);
    assert_eq!(h.provider.state().display_mode, DisplayMode::AllMessages);
}

#[test]
fn test_pause_and_dispose_cancel_goal_fetch() {
    let mut h = Harness::new(FakeEditor::at("/a.lean", 2, 5));
    h.provider.set_mode(DisplayMode::OnlyState).unwrap();
    let first = h.provider.backend().last_ticket();

    h.provider.pause();
    assert_eq!(h.provider.pending_ticket(), None);
    assert_eq!(h.provider.backend().cancelled, vec![first]);

    h.provider.resume().unwrap();
    let second = h.provider.backend().last_ticket();
    assert_ne!(first, second);

    h.provider.dispose();
    assert_eq!(h.provider.pending_ticket(), None);
    assert_eq!(h.provider.backend().cancelled, vec![first, second]);
}

#[derive(Default)]
struct CountingBackend {
    requests: usize,
}

impl InfoBackend for CountingBackend {
    fn request_info(
        &mut self,
        _ticket: FetchTicket,
        _location: &Location,
    ) -> Result<(), BackendError> {
        self.requests += 1;
        Ok(())
    }
}

#[test]
fn test_backend_without_cancellation_can_be_superseded() {
    let mut provider = InfoProvider::new(
        FakeEditor::at("/a.lean", 2, 5),
        CountingBackend::default(),
        DocumentSelector::any(),
    );
    provider.set_mode(DisplayMode::OnlyState).unwrap();
    provider.editor_mut().move_to("/a.lean", 4, 0);
    provider.on_selection_changed().unwrap();
    provider.pause();

    assert_eq!(provider.backend().requests, 2);
    assert_eq!(provider.pending_ticket(), None);
}
