use chrono::{DateTime, Utc};

use crate::{
    error::{FetchError, FetchTarget},
    requests::{
        ControllerEvent, EmptyState, Notification, NotificationKind, OrganizationsState,
        RequestsState, ViewModel,
    },
    tui::helper::{
        Align, ColSpec, RenderOpts, Table, dim, format_relative_time, green, pending_badge, red,
        terminal_width, yellow,
    },
};

/// Renders the request list or the message replacing it.
pub fn render_requests(model: &ViewModel, now: DateTime<Utc>, width: usize, opts: &RenderOpts) -> String {
    if model.organization_empty_state == EmptyState::NoOrganizations {
        return message_line(opts, EmptyState::NoOrganizations);
    }
    if let OrganizationsState::Failed(reason) = &model.organizations {
        return format!("{}\n", red(opts, reason));
    }
    if model.active_organization.is_none() {
        return format!("{}\n", dim(opts, "No organization selected"));
    }

    // a failed refetch keeps the previous list below the banner
    let mut out = String::new();
    if let RequestsState::Failed(reason) = &model.requests_state {
        let err = FetchError::new(FetchTarget::Requests, reason.as_str());
        out.push_str(&format!("{}\n", red(opts, &err.to_string())));
    }
    if model.empty_state != EmptyState::None {
        out.push_str(&message_line(opts, model.empty_state));
        return out;
    }
    if model.view_items.is_empty() {
        if model.requests_state == RequestsState::Loading {
            out.push_str(&format!("{}\n", dim(opts, "Loading requests...")));
        }
        return out;
    }

    let t = Table::new(
        width,
        2,
        vec![
            ColSpec {
                title: "ID",
                min: 8,
                max: Some(36),
                weight: 1,
                align: Align::Left,
            },
            ColSpec {
                title: "NAME",
                min: 12,
                max: None,
                weight: 3,
                align: Align::Left,
            },
            ColSpec {
                title: "REQUESTED",
                min: 14,
                max: Some(14),
                weight: 0,
                align: Align::Left,
            },
            ColSpec {
                title: "STATUS",
                min: 7,
                max: Some(7),
                weight: 0,
                align: Align::Left,
            },
        ],
    );

    t.header(&mut out, opts);
    for request in &model.view_items {
        let requested = format_relative_time(&request.requested_at, now);
        let status = pending_badge(opts, model.pending_action_ids.contains(&request.id));
        t.row(
            &mut out,
            &[&request.id, &request.full_name(), &requested, &status],
            opts,
        );
    }
    out
}

fn message_line(opts: &RenderOpts, state: EmptyState) -> String {
    match state.message() {
        Some(message) => format!("{}\n", yellow(opts, message)),
        None => String::new(),
    }
}

/// One-line summary of the search box and sort toggle.
pub fn render_status_line(model: &ViewModel, opts: &RenderOpts) -> String {
    let search = if model.search_text.is_empty() {
        dim(opts, "(none)")
    } else if model.search_text != model.applied_search {
        format!("{:?} {}", model.search_text, dim(opts, "(typing)"))
    } else {
        format!("{:?}", model.search_text)
    };
    format!(
        "{} {}  {} {}  {} {}",
        dim(opts, "search:"),
        search,
        dim(opts, "sort:"),
        model.sort_order,
        dim(opts, "shown:"),
        model.view_items.len()
    )
}

pub fn render_notification(notification: &Notification, opts: &RenderOpts) -> String {
    match notification.kind {
        NotificationKind::Success => green(opts, &notification.message),
        NotificationKind::Error => red(opts, &notification.message),
    }
}

pub fn print_requests(model: &ViewModel) {
    let opts = RenderOpts::default();
    let width = terminal_width().unwrap_or(96);
    print!("{}", render_requests(model, Utc::now(), width, &opts));
}

pub fn print_status_line(model: &ViewModel) {
    println!("{}", render_status_line(model, &RenderOpts::default()));
}

/// Prints the event's notification, if it carries one.
pub fn print_event(event: &ControllerEvent) {
    if let Some(notification) = event.notification() {
        let line = render_notification(notification, &RenderOpts::default());
        match notification.kind {
            NotificationKind::Success => println!("{line}"),
            NotificationKind::Error => eprintln!("{line}"),
        }
    }
}
