use reqctl_shared::org::Organization;

use crate::{
    requests::EmptyState,
    tui::helper::{Align, ColSpec, RenderOpts, Table, bold, dim, green, terminal_width, yellow},
};

pub fn render_organizations(
    orgs: &[Organization],
    active: Option<&str>,
    width: usize,
    opts: &RenderOpts,
) -> String {
    if orgs.is_empty() {
        let message = EmptyState::NoOrganizations.message().unwrap_or_default();
        return format!("{}\n", yellow(opts, message));
    }

    let t = Table::new(
        width,
        2,
        vec![
            ColSpec {
                title: "",
                min: 1,
                max: Some(1),
                weight: 0,
                align: Align::Left,
            },
            ColSpec {
                title: "ORG ID",
                min: 12,
                max: Some(40),
                weight: 2,
                align: Align::Left,
            },
            ColSpec {
                title: "NAME",
                min: 12,
                max: None,
                weight: 3,
                align: Align::Left,
            },
        ],
    );

    let mut out = String::new();
    t.header(&mut out, opts);
    for org in orgs {
        let marker = if active == Some(org.id.as_str()) {
            green(opts, "*")
        } else {
            String::new()
        };
        t.row(&mut out, &[&marker, &org.id, &org.name], opts);
    }
    out
}

pub fn print_organizations(orgs: &[Organization], active: Option<&str>) {
    let opts = RenderOpts::default();
    let width = terminal_width().unwrap_or(96);
    print!("{}", render_organizations(orgs, active, width, &opts));
}

pub fn print_active_organization(org: &Organization) {
    let opts = RenderOpts::default();
    println!(
        "{} {} {}",
        dim(&opts, "Organization:"),
        bold(&opts, &org.name),
        dim(&opts, &format!("({})", org.id))
    );
}
