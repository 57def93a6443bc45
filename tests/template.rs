//! End-to-end rendering behavior through the public API.

use serde_json::json;
use stencil::{compile_str, render_template, Engine};

fn render(source: &str, data: &serde_json::Value) -> String {
    render_template(source, data).expect("data should encode")
}

#[test]
fn escapes_exactly_once_by_default() {
    assert_eq!(render("{{ x }}", &json!({"x": "<b>"})), "&lt;b&gt;");
    assert_eq!(render("{{ x }}", &json!({"x": "a & b"})), "a &amp; b");
}

#[test]
fn raw_marker_bypasses_escaping() {
    assert_eq!(render("{{= x }}", &json!({"x": "<b>"})), "<b>");
}

#[test]
fn or_fallback_distinguishes_empty_from_falsy() {
    // 0 and false are falsy but not empty
    assert_eq!(render("{{ v || 'd' }}", &json!({"v": 0})), "0");
    assert_eq!(render("{{ v || 'd' }}", &json!({"v": false})), "false");

    assert_eq!(render("{{ v || 'd' }}", &json!({"v": ""})), "d");
    assert_eq!(render("{{ v || 'd' }}", &json!({"v": []})), "d");
    assert_eq!(render("{{ v || 'd' }}", &json!({"v": {}})), "d");
}

#[test]
fn nullish_fallback_only_replaces_null_and_absent() {
    assert_eq!(render("{{ v ?? 'd' }}", &json!({"v": null})), "d");
    assert_eq!(render("{{ v ?? 'd' }}", &json!({})), "d");
    assert_eq!(render("{{ v ?? 'd' }}", &json!({"v": ""})), "");
    assert_eq!(render("{{ v ?? 'd' }}", &json!({"v": 0})), "0");
}

#[test]
fn one_bad_fallback_token_discards_the_whole_chain() {
    // The chain is cleared entirely, not truncated at the bad link:
    // the earlier, well-formed 'ok' fallback is lost too.
    assert_eq!(render("{{ name || 'ok' || 9bad }}", &json!({})), "");
    assert_eq!(
        render("{{ name || 'ok' || 9bad }}", &json!({"name": "Ada"})),
        "Ada"
    );
}

#[test]
fn function_call_syntax_never_executes() {
    assert_eq!(render("{{ fn() }}", &json!({})), "{{ fn() }}");
}

#[test]
fn only_named_map_entries_resolve() {
    // No length property, no method lookup: paths read map entries and
    // nothing else.
    let data = json!({"items": [1, 2, 3], "s": "abc"});
    assert_eq!(render("[{{ items.length }}]", &data), "[]");
    assert_eq!(render("[{{ s.len }}]", &data), "[]");
}

#[test]
fn loop_variables_shadow_and_do_not_leak() {
    let data = json!({"it": "OUT", "items": ["A", "B"]});
    assert_eq!(
        render("{{ it }}|{% each items as it %}({{ it }}){% endeach %}|{{ it }}", &data),
        "OUT|(A)(B)|OUT"
    );
}

#[test]
fn loop_index_and_nested_paths() {
    let data = json!({"users": [{"name": "Ada"}, {"name": "Bob"}]});
    assert_eq!(
        render("{% each users as u, i %}{{ i }}:{{ u.name }};{% endeach %}", &data),
        "0:Ada;1:Bob;"
    );
}

#[test]
fn elseif_takes_the_first_true_branch_only() {
    let source = "{% if a %}A{% elseif b %}B{% elseif c %}C{% endif %}";
    assert_eq!(render(source, &json!({"a": 0, "b": 1, "c": 1})), "B");
    assert_eq!(render(source, &json!({"a": 0, "b": 0, "c": 0})), "");
}

#[test]
fn comparison_operators() {
    let source = "{% if n > 10 %}GT{% else %}LE{% endif %}";
    assert_eq!(render(source, &json!({"n": 11})), "GT");
    assert_eq!(render(source, &json!({"n": 10})), "LE");

    assert_eq!(render("{% if s == 5 %}y{% else %}n{% endif %}", &json!({"s": "5"})), "y");
    assert_eq!(render("{% if x == null %}y{% else %}n{% endif %}", &json!({})), "y");
}

#[test]
fn unknown_filter_is_a_no_op() {
    assert_eq!(
        render("{{ name | doesNotExist }}", &json!({"name": "Ada"})),
        "Ada"
    );
}

#[test]
fn builtin_filters_end_to_end() {
    let data = json!({"title": "hello world", "n": 1234567.891, "t": 0});
    assert_eq!(render("{{ title | upper }}", &data), "HELLO WORLD");
    assert_eq!(render("{{ n | numberformat(2) }}", &data), "1,234,567.89");
    assert_eq!(
        render("{{ t | dateformat('YYYY-MM-DD') }}", &data),
        "1970-01-01"
    );
    assert_eq!(
        render("{{ title | urlencode }}", &data),
        "hello%20world"
    );

    // date-shaped strings with impossible years render unchanged
    assert_eq!(
        render(
            "{{ d | dateformat('YYYY') }}",
            &json!({"d": "999999999999999999-01-01"})
        ),
        "999999999999999999-01-01"
    );
}

#[test]
fn trim_markers_and_block_newlines() {
    // control tokens on their own line leave no blank lines behind
    let source = "a\n{% if ok %}\nb\n{% endif %}\nc";
    assert_eq!(render(source, &json!({"ok": true})), "a\nb\nc");
    assert_eq!(render(source, &json!({"ok": false})), "a\nc");

    // explicit markers trim surrounding whitespace
    assert_eq!(render("a  {{- x -}}  b", &json!({"x": "X"})), "aXb");
    // ~ never crosses a newline
    assert_eq!(render("a \n {{~ x }}", &json!({"x": "X"})), "a \nX");
}

#[test]
fn malformed_templates_render_close_to_their_source() {
    assert_eq!(render("{% bogus %}", &json!({})), "{% bogus %}");
    assert_eq!(render("{{ 9lives }}", &json!({})), "{{ 9lives }}");
    assert_eq!(render("text {{ open", &json!({})), "text {{ open");

    // unclosed blocks flatten: tags become text, inner nodes still render
    assert_eq!(
        render("{% if ok %}{{ x }}", &json!({"x": "X", "ok": false})),
        "{% if ok %}X"
    );
}

#[test]
fn compiled_templates_are_reusable() {
    let template = compile_str("Hi {{ name }}");
    let engine = Engine::new();
    assert_eq!(
        engine.render_template(&template, &json!({"name": "Ada"})).unwrap(),
        "Hi Ada"
    );
    assert_eq!(
        engine.render_template(&template, &json!({"name": "Bob"})).unwrap(),
        "Hi Bob"
    );
}

#[test]
fn comments_disappear() {
    assert_eq!(render("a{# hidden {{ x }} #}b", &json!({"x": "X"})), "ab");
}
