//! Reconciliation events to patches
//!
//! Displayable kinds are looked up in [`RENDERERS`]; adding a kind means
//! adding a row there, not another branch in [`emit`].

use crate::patch::{client, selectors, Patch};
use crate::render;
use seneca_reconcile::ReconcileEvent;
use seneca_record::{RecordKind, ResultRecord};
use serde_json::json;

type RenderFn = fn(&ResultRecord, &str) -> Vec<Patch>;

struct Renderer {
    kind: RecordKind,
    create: RenderFn,
    update: RenderFn,
}

const RENDERERS: &[Renderer] = &[
    Renderer {
        kind: RecordKind::Plot,
        create: create_image,
        update: update_image,
    },
    Renderer {
        kind: RecordKind::Image,
        create: create_image,
        update: update_image,
    },
    Renderer {
        kind: RecordKind::Table,
        create: create_table,
        update: update_table,
    },
];

fn renderer(kind: RecordKind) -> Option<&'static Renderer> {
    RENDERERS.iter().find(|r| r.kind == kind)
}

/// DOM id of a plot's companion table
fn companion_id(dom_id: &str) -> String {
    format!("{dom_id}-table")
}

fn create_image(record: &ResultRecord, dom_id: &str) -> Vec<Patch> {
    vec![
        Patch::append(
            selectors::PLOTS_CONTAINER,
            render::plot_container(dom_id, record.description.as_deref()),
        ),
        Patch::append(
            selectors::routine_list(&record.routine_file),
            render::list_entry(dom_id, &record.name, record.kind.as_str()),
        ),
        Patch::invoke(
            client::INIT_IMG,
            vec![json!(record.image_url().unwrap_or_default()), json!(dom_id)],
        ),
    ]
}

fn update_image(record: &ResultRecord, dom_id: &str) -> Vec<Patch> {
    vec![Patch::invoke(
        client::UPDATE_IMG,
        vec![json!(record.image_url().unwrap_or_default()), json!(dom_id)],
    )]
}

fn create_companion(record: &ResultRecord, dom_id: &str) -> Vec<Patch> {
    let Some(data) = record.table() else {
        return Vec::new();
    };
    let table_id = companion_id(dom_id);
    vec![
        Patch::append(
            selectors::PLOTS_CONTAINER,
            render::table_container(
                &table_id,
                record.description.as_deref(),
                &record.routine_file,
                &record.name,
                data,
            ),
        ),
        Patch::append(
            selectors::routine_list(&record.routine_file),
            render::list_entry(&table_id, &record.name, RecordKind::Table.as_str()),
        ),
        Patch::invoke(client::INIT_TABLE, vec![json!(table_id)]),
    ]
}

fn update_companion(record: &ResultRecord, dom_id: &str) -> Vec<Patch> {
    let Some(data) = record.table() else {
        return Vec::new();
    };
    vec![Patch::set_html(
        selectors::element(&companion_id(dom_id)),
        render::table_html(&record.routine_file, &record.name, data),
    )]
}

fn create_table(record: &ResultRecord, dom_id: &str) -> Vec<Patch> {
    let empty = Default::default();
    let data = record.table().unwrap_or(&empty);
    vec![
        Patch::append(
            selectors::PLOTS_CONTAINER,
            render::table_container(
                dom_id,
                record.description.as_deref(),
                &record.routine_file,
                &record.name,
                data,
            ),
        ),
        Patch::append(
            selectors::routine_list(&record.routine_file),
            render::list_entry(dom_id, &record.name, record.kind.as_str()),
        ),
        Patch::invoke(client::INIT_TABLE, vec![json!(dom_id)]),
    ]
}

fn update_table(record: &ResultRecord, dom_id: &str) -> Vec<Patch> {
    let empty = Default::default();
    let data = record.table().unwrap_or(&empty);
    vec![Patch::set_html(
        selectors::element(dom_id),
        render::table_html(&record.routine_file, &record.name, data),
    )]
}

fn render_record(record: &ResultRecord, create: bool) -> Vec<Patch> {
    let (Some(key), Some(renderer)) = (record.key(), renderer(record.kind)) else {
        return Vec::new();
    };
    let dom_id = key.dom_id();
    if create {
        (renderer.create)(record, &dom_id)
    } else {
        (renderer.update)(record, &dom_id)
    }
}

fn render_companion(record: &ResultRecord, draw: RenderFn) -> Vec<Patch> {
    record
        .key()
        .map(|key| draw(record, &key.dom_id()))
        .unwrap_or_default()
}

/// Patches for one event, in the order the client must apply them
#[must_use]
pub fn emit(event: &ReconcileEvent) -> Vec<Patch> {
    match event {
        ReconcileEvent::IntroduceRoutine { routine_file } => vec![
            Patch::status(&format!("Receiving data from '{routine_file}'.")),
            Patch::append(
                selectors::PLOT_LIST,
                render::routine_container(&selectors::routine_list_id(routine_file), routine_file),
            ),
        ],
        ReconcileEvent::Create(record) => render_record(record, true),
        ReconcileEvent::Update(record) => render_record(record, false),
        ReconcileEvent::CreateCompanion(record) => render_companion(record, create_companion),
        ReconcileEvent::UpdateCompanion(record) => render_companion(record, update_companion),
        ReconcileEvent::Message { routine_file, text } => {
            vec![Patch::status(&format!("'{routine_file}': {text}"))]
        }
        ReconcileEvent::Complete { routine_file } => {
            vec![Patch::status(&format!("'{routine_file}': Analysis complete!"))]
        }
    }
}

/// Patches for a sequence of events, concatenated in order
#[must_use]
pub fn emit_all<'a>(events: impl IntoIterator<Item = &'a ReconcileEvent>) -> Vec<Patch> {
    events.into_iter().flat_map(emit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use seneca_record::RecordKey;
    use seneca_test_utils::{complete_record, message_record, plot_record, table_record};

    fn ops(patches: &[Patch]) -> Vec<&'static str> {
        patches.iter().map(Patch::op).collect()
    }

    #[test]
    fn every_displayable_kind_has_a_renderer() {
        for kind in RecordKind::ALL {
            assert_eq!(renderer(kind).is_some(), kind.is_displayable(), "{kind}");
        }
    }

    #[test]
    fn introduction_adds_routine_container() {
        let patches = emit(&ReconcileEvent::IntroduceRoutine {
            routine_file: "fit.py".to_string(),
        });
        assert_eq!(patches[0], Patch::status("Receiving data from 'fit.py'."));
        match &patches[1] {
            Patch::AppendContainer { parent_selector, html } => {
                assert_eq!(parent_selector, "#plot-list");
                let id = selectors::routine_list_id("fit.py");
                assert!(html.contains(&format!("id=\"{id}\"")));
            }
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn similar_routine_names_get_separate_containers() {
        let containers: Vec<_> = ["run.1.py", "run-1.py"]
            .into_iter()
            .map(|file| {
                emit(&ReconcileEvent::IntroduceRoutine {
                    routine_file: file.to_string(),
                })
            })
            .collect();
        assert_ne!(containers[0][1], containers[1][1]);

        let entry = emit(&ReconcileEvent::Create(plot_record("run-1.py", "p", 0)));
        assert!(matches!(
            &entry[1],
            Patch::AppendContainer { parent_selector, .. }
                if *parent_selector == selectors::routine_list("run-1.py")
        ));
    }

    #[test]
    fn plot_create_appends_containers_before_init() {
        let record = plot_record("fit.py", "residuals", 0);
        let dom_id = record.key().unwrap().dom_id();
        let patches = emit(&ReconcileEvent::Create(record));

        assert_eq!(ops(&patches), vec!["append_container", "append_container", "invoke_client"]);
        assert!(matches!(
            &patches[0],
            Patch::AppendContainer { parent_selector, html }
                if parent_selector == "#plots-container" && html.contains(&dom_id)
        ));
        assert!(matches!(
            &patches[1],
            Patch::AppendContainer { parent_selector, html }
                if *parent_selector == selectors::routine_list("fit.py")
                    && html.contains("residuals - plot")
        ));
        match &patches[2] {
            Patch::InvokeClient { function, args } => {
                assert_eq!(function, "init_img");
                assert!(args[0].as_str().unwrap().starts_with("data:image/png;base64,"));
                assert_eq!(args[1], json!(dom_id));
            }
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn plot_update_reuses_element_id() {
        let create = plot_record("fit.py", "residuals", 0);
        let update = plot_record("fit.py", "residuals", 3);
        let created = emit(&ReconcileEvent::Create(create));
        let updated = emit(&ReconcileEvent::Update(update));

        let Patch::InvokeClient { args: init_args, .. } = &created[2] else {
            panic!("expected init_img");
        };
        assert_eq!(
            updated,
            vec![Patch::invoke(client::UPDATE_IMG, vec![init_args[0].clone(), init_args[1].clone()])]
        );
    }

    #[test]
    fn table_rows_follow_key_order() {
        let record = table_record("fit.py", "params", 0, json!({"b": 2, "a": 1}));
        let patches = emit(&ReconcileEvent::Create(record));
        let Patch::AppendContainer { html, .. } = &patches[0] else {
            panic!("expected table container");
        };
        let a = html.find("<th>a</th>").unwrap();
        let b = html.find("<th>b</th>").unwrap();
        assert!(a < b);
        assert!(html.contains("<caption>fit.py (params)</caption>"));
        assert_eq!(ops(&patches)[2], "invoke_client");
    }

    #[test]
    fn table_update_replaces_body() {
        let record = table_record("fit.py", "params", 1, json!({"a": 3}));
        let dom_id = RecordKey::new("fit.py", RecordKind::Table, "params").dom_id();
        let patches = emit(&ReconcileEvent::Update(record));
        assert_eq!(
            patches,
            vec![Patch::set_html(
                format!("#{dom_id}"),
                "<table><caption>fit.py (params)</caption><tbody><tr><th>a</th><td>3</td></tr></tbody></table>"
            )]
        );
    }

    #[test]
    fn companion_table_follows_plot() {
        let entry = seneca_test_utils::plot_entry("fit.py", "fit", 0).with_data(json!({"slope": 2}));
        let record = ResultRecord::from_entry(entry).unwrap();
        let table_id = format!("{}-table", record.key().unwrap().dom_id());

        let created = emit(&ReconcileEvent::CreateCompanion(record.clone()));
        assert_eq!(ops(&created), vec!["append_container", "append_container", "invoke_client"]);
        assert!(matches!(
            &created[1],
            Patch::AppendContainer { html, .. } if html.contains("fit - table")
        ));
        assert_eq!(
            created[2],
            Patch::invoke(client::INIT_TABLE, vec![json!(table_id.clone())])
        );

        let updated = emit(&ReconcileEvent::UpdateCompanion(record.clone()));
        assert!(matches!(
            &updated[..],
            [Patch::SetHtml { selector, .. }] if *selector == format!("#{table_id}")
        ));

        // The plot itself never touches the companion
        assert_eq!(emit(&ReconcileEvent::Create(record.clone())).len(), 3);
        assert_eq!(emit(&ReconcileEvent::Update(record)).len(), 1);
    }

    #[test]
    fn image_create_and_update() {
        let record =
            ResultRecord::from_entry(seneca_test_utils::image_entry("cam.py", "frame")).unwrap();
        let dom_id = RecordKey::new("cam.py", RecordKind::Image, "frame").dom_id();

        let created = emit(&ReconcileEvent::Create(record.clone()));
        assert_eq!(ops(&created), vec!["append_container", "append_container", "invoke_client"]);
        assert!(matches!(
            &created[1],
            Patch::AppendContainer { html, .. } if html.contains("frame - image")
        ));
        let url = json!(format!("data:image/png;base64,{}", seneca_test_utils::PNG_BASE64));
        assert_eq!(created[2], Patch::invoke(client::INIT_IMG, vec![url.clone(), json!(dom_id)]));
        assert_eq!(
            emit(&ReconcileEvent::Update(record)),
            vec![Patch::invoke(client::UPDATE_IMG, vec![url, json!(dom_id)])]
        );
    }

    #[test]
    fn status_events_format_text() {
        let events = vec![
            ReconcileEvent::Message {
                routine_file: "fit.py".to_string(),
                text: "step <1>".to_string(),
            },
            ReconcileEvent::Complete {
                routine_file: "fit.py".to_string(),
            },
        ];
        assert_eq!(
            emit_all(&events),
            vec![
                Patch::status("'fit.py': step <1>"),
                Patch::status("'fit.py': Analysis complete!"),
            ]
        );
    }

    #[test]
    fn non_displayable_records_render_nothing() {
        assert!(emit(&ReconcileEvent::Create(message_record("fit.py", "x"))).is_empty());
        assert!(emit(&ReconcileEvent::Update(complete_record("fit.py"))).is_empty());
    }
}
