//! Randomized fail-safe check: templates assembled from the token
//! alphabet must always parse and render without panicking, whatever
//! nonsense the pieces form.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

const PIECES: &[&str] = &[
    "{{", "{{=", "{{-", "}}", "-}}", "{%", "%}", "{#", "#}",
    "if ", "elseif ", "else", "endif", "each ", "endeach", "as ",
    "name", "items", "user.name", "it", "i",
    "||", "??", "|", "==", "!=", ">", "<", ">=", "<=", "&&", "!", "not ",
    "'str'", "\"q\"", "9", "-1.5", "true", "null",
    "(", ")", ",", " ", "\n", "~", "plain text ", "upper", "replace",
];

#[test]
fn random_token_soup_never_panics() {
    let data = json!({
        "name": "Ada",
        "items": ["a", "b", "c"],
        "user": {"name": "Bob"},
        "n": 5,
    });

    let mut rng = StdRng::seed_from_u64(0x7e11);
    for _ in 0..1000 {
        let len = rng.gen_range(0..30);
        let mut source = String::new();
        for _ in 0..len {
            source.push_str(PIECES[rng.gen_range(0..PIECES.len())]);
        }

        // must produce a string, never an error or a panic
        let out = stencil::render_template(&source, &data)
            .expect("encoding fixed data cannot fail");
        drop(out);
    }
}

#[test]
fn deeply_nested_blocks_terminate() {
    let mut source = String::new();
    for _ in 0..200 {
        source.push_str("{% if n %}{% each items as it %}");
    }
    source.push('x');

    let data = json!({"n": 1, "items": [1]});
    let out = stencil::render_template(&source, &data).unwrap();
    assert!(out.ends_with('x'));
}
