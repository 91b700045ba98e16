//! End-to-end behaviour of the engine under both reconstruction strategies.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use rewrite_engine::{
    Engine, MarkupParser, MarkupSerializer, MatchPolicy, Phase, Replacement, Rewrite, Rule,
    Strategy, shift_end,
};

const STRATEGIES: [Strategy; 2] = [Strategy::Splice, Strategy::Reserialize];

fn tag(
    name: &'static str,
    render: impl Fn(&str, usize) -> String + Send + Sync + 'static,
) -> Box<dyn Rewrite> {
    Rule::new(move |e| e.name() == name, move |e, index| render(&e.inner_html, index))
        .with_name(name)
        .boxed()
}

fn remove(name: &'static str) -> Box<dyn Rewrite> {
    Rule::new(move |e| e.name() == name, |_, _| Replacement::Remove)
        .with_name(name)
        .boxed()
}

#[test]
fn test_identity_without_rules() {
    let inputs = [
        "",
        "plain text",
        "<!DOCTYPE html>\n<html>\n  <body class='x'>\n    <p>a &amp; b</p>\n  </body>\n</html>\n",
        "<a  x='1'/><!-- c --><b></b>",
    ];
    for strategy in STRATEGIES {
        let engine = Engine::new(Vec::new()).with_strategy(strategy);
        for input in inputs {
            assert_eq!(engine.transform(input).unwrap(), input, "strategy {strategy}");
        }
    }
}

#[test]
fn test_identity_when_nothing_matches() {
    let input = "<section  id='s'>\n  <p>text</p>\n</section>";
    for strategy in STRATEGIES {
        let engine = Engine::new(vec![remove("missing")]).with_strategy(strategy);
        assert_eq!(engine.transform(input).unwrap(), input, "strategy {strategy}");
    }
}

#[test]
fn test_removal() {
    for strategy in STRATEGIES {
        let engine = Engine::new(vec![remove("drop")]).with_strategy(strategy);
        assert_eq!(
            engine.transform("<a>1</a><drop>x</drop><a>2</a>").unwrap(),
            "<a>1</a><a>2</a>",
            "strategy {strategy}"
        );
    }
}

#[test]
fn test_removal_from_render_returning_none() {
    let engine = Engine::new(vec![
        Rule::new(|e| e.name() == "drop", |_, _| None::<String>).boxed(),
    ]);
    assert_eq!(engine.transform("<p><drop/>kept</p>").unwrap(), "<p>kept</p>");
}

#[test]
fn test_substitution_with_index() {
    for strategy in STRATEGIES {
        for policy in [MatchPolicy::AllAtOnce, MatchPolicy::IterativeFirst] {
            let engine = Engine::new(vec![tag("item", |_, index| format!("#{index}"))])
                .with_strategy(strategy)
                .with_policy(policy);
            assert_eq!(
                engine.transform("<item/><item/><item/>").unwrap(),
                "#0#1#2",
                "strategy {strategy}, policy {policy}"
            );
        }
    }
}

#[test]
fn test_match_index_is_per_rule() {
    let engine = Engine::new(vec![
        tag("a", |_, index| format!("a{index}")),
        tag("b", |_, index| format!("b{index}")),
    ]);
    assert_eq!(
        engine.transform("<a/><b/><a/><b/><b/>").unwrap(),
        "a0b0a1b1b2"
    );
}

#[test]
fn test_nested_resolution_order() {
    for strategy in STRATEGIES {
        let engine = Engine::new(vec![
            tag("b", |inner, _| format!("B({inner})")),
            tag("a", |inner, _| format!("A({inner})")),
        ])
        .with_strategy(strategy);
        assert_eq!(
            engine.transform("<a><b>x</b></a>").unwrap(),
            "A(B(x))",
            "strategy {strategy}"
        );
    }
}

#[test]
fn test_inner_renders_before_outer() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&order);
    let engine = Engine::new(vec![
        Rule::new(|_| true, move |e, _| {
            log.lock().unwrap().push(e.name.clone());
            e.inner_html.clone()
        })
        .boxed(),
    ]);

    let output = engine
        .transform("<root><one><two/></one><three/></root>")
        .unwrap();

    assert_eq!(output, "");
    assert_eq!(*order.lock().unwrap(), vec!["two", "one", "three", "root"]);
}

#[test]
fn test_phase_ordering() {
    let x_to_y = |phase: Phase| {
        Rule::new(|e| e.name() == "x", |_, _| "<y/>")
            .with_phase(phase)
            .boxed()
    };
    let y_to_z = |phase: Phase| {
        Rule::new(|e| e.name() == "y", |_, _| "z")
            .with_phase(phase)
            .boxed()
    };

    let engine = Engine::new(vec![x_to_y(Phase::Pre), y_to_z(Phase::Post)]);
    assert_eq!(engine.transform("<x/>").unwrap(), "z");

    let engine = Engine::new(vec![x_to_y(Phase::Post), y_to_z(Phase::Pre)]);
    assert_eq!(engine.transform("<x/>").unwrap(), "<y/>");
}

#[test]
fn test_post_rules_see_pre_output_as_text() {
    let engine = Engine::new(vec![
        tag("a", |inner, _| format!("<b>{inner}</b>")),
        Rule::new(|e| e.name() == "b", |e, index| format!("[{index}:{}]", e.inner_html))
            .with_phase(Phase::Post)
            .boxed(),
    ]);
    assert_eq!(
        engine.transform("<a>1</a><b>2</b>").unwrap(),
        "[0:1][1:2]"
    );
}

#[test]
fn test_splice_matches_reference_model() {
    let inputs = [
        "<p>a</p> <x>1</x>\n<p>bb</p><x/>tail",
        "<x>1</x><x>22</x><x>333</x>",
        "<div><x k='v'>one</x><span>keep</span><x>two</x></div><x/>",
        "<!-- lead --><x>é</x>мир<x>ü</x>",
    ];

    for input in inputs {
        let engine = Engine::new(vec![tag("x", |inner, index| {
            "*".repeat(index * 3 + inner.len())
        })]);
        let output = engine.transform(input).unwrap();

        let doc = MarkupParser::new().parse(input).unwrap();
        let mut expected = String::new();
        let mut cursor = 0;
        let mut index = 0;
        for id in doc.elements() {
            let node = doc.node(id);
            let Some(element) = node.element() else {
                continue;
            };
            if element.name != "x" || node.start < cursor {
                continue;
            }
            let inner = MarkupSerializer::new().serialize_children(&doc, id);
            expected.push_str(&input[cursor..node.start]);
            expected.push_str(&"*".repeat(index * 3 + inner.len()));
            cursor = node.end + 1;
            index += 1;
        }
        expected.push_str(&input[cursor..]);

        assert_eq!(output, expected, "input {input:?}");
    }
}

#[test]
fn test_end_offset_shifts_with_inner_rewrites() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = |name: &'static str, render: fn(&str) -> String| -> Box<dyn Rewrite> {
        let seen = Arc::clone(&seen);
        Rule::new(move |e| e.name() == name, move |e, _| {
            seen.lock()
                .unwrap()
                .push((e.name.clone(), e.start, e.end, e.inner_html.len()));
            render(&e.inner_html)
        })
        .boxed()
    };

    let engine = Engine::new(vec![
        record("outer", |inner| format!("OUT({inner})")),
        record("mid", |_| "m".to_owned()),
        record("leaf", |inner| inner.repeat(10)),
    ]);

    let input = "<outer><mid><leaf>abc</leaf></mid></outer>tail";
    assert_eq!(engine.transform(input).unwrap(), "OUT(m)tail");

    // <leaf>abc</leaf> is 16 bytes and rewrites to 30; <mid>..</mid> is 27
    // bytes and rewrites to 1.
    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("leaf".to_owned(), 0, 15, 3),
            ("mid".to_owned(), 0, 26 + 30 - 16, 30),
            ("outer".to_owned(), 0, 41 + 1 - 27, 1),
        ]
    );
    assert_eq!(shift_end(26, 16, 30), 40);
    assert_eq!(shift_end(41, 27, 1), 15);
}

#[test]
fn test_reserialize_normalizes_unmatched_regions() {
    let engine = Engine::new(vec![remove("drop")]).with_strategy(Strategy::Reserialize);
    assert_eq!(
        engine.transform("<p  class='a'>x</p><drop/>").unwrap(),
        r#"<p class="a">x</p>"#
    );

    let engine = Engine::new(vec![remove("drop")]);
    assert_eq!(
        engine.transform("<p  class='a'>x</p><drop/>").unwrap(),
        "<p  class='a'>x</p>"
    );
}

#[test]
fn test_snapshot_attributes_and_namespace() {
    let engine = Engine::new(vec![
        Rule::new(
            |e| e.local_name() == "icon" && e.namespace() == Some("urn:icons"),
            |e, _| {
                let attrs: Vec<String> = e
                    .attributes
                    .iter()
                    .filter(|(name, _)| !name.starts_with("xmlns"))
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                format!("<i {}/>", attrs.join(" "))
            },
        )
        .boxed(),
    ]);

    let output = engine
        .transform(r#"<root xmlns:ic="urn:icons"><ic:icon name="star" size="2"/><icon/></root>"#)
        .unwrap();
    assert_eq!(
        output,
        r#"<root xmlns:ic="urn:icons"><i name=star size=2/><icon/></root>"#
    );
}

#[test]
fn test_concurrent_documents_share_engine() {
    let engine = Engine::new(vec![tag("item", |inner, index| format!("{index}:{inner}"))]);
    let inputs: Vec<String> = (0..8)
        .map(|n| "<item>v</item>".repeat(n + 1))
        .collect();

    let engine = &engine;
    let outputs: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| scope.spawn(move || engine.transform(input).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (n, output) in outputs.iter().enumerate() {
        let expected: String = (0..=n).map(|i| format!("{i}:v")).collect();
        assert_eq!(output, &expected);
    }
}

#[test]
fn test_namespace_matching_inside_matched_element() {
    let top = r#"<root xmlns:ic="urn:icons"><ic:icon/></root>"#;
    let nested = r#"<root xmlns:ic="urn:icons"><wrap><ic:icon/></wrap></root>"#;

    for strategy in STRATEGIES {
        let engine = Engine::new(vec![
            tag("wrap", |inner, _| format!("W({inner})")),
            Rule::new(|e| e.namespace() == Some("urn:icons"), |_, _| "ICON").boxed(),
        ])
        .with_strategy(strategy);

        assert_eq!(
            engine.transform(top).unwrap(),
            r#"<root xmlns:ic="urn:icons">ICON</root>"#,
            "strategy {strategy}"
        );
        assert_eq!(
            engine.transform(nested).unwrap(),
            r#"<root xmlns:ic="urn:icons">W(ICON)</root>"#,
            "strategy {strategy}"
        );
    }
}

#[test]
fn test_inline_script_with_ampersands() {
    let input = "<html><script>if (a && b) {}</script><x/></html>";
    for strategy in STRATEGIES {
        let engine = Engine::new(vec![tag("x", |_, _| "X".to_owned())]).with_strategy(strategy);
        assert_eq!(
            engine.transform(input).unwrap(),
            "<html><script>if (a && b) {}</script>X</html>",
            "strategy {strategy}"
        );
    }
}
