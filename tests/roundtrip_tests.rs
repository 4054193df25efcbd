// tests/roundtrip_tests.rs
#![cfg(feature = "unparse")]

mod common;

use common::encode_bare;
use pyast_json::codec::render_json;
use pyast_json::config::PythonVersion;
use pyast_json::{PythonAstJsonTool, SourceType, ToolConfig};

/// Source -> JSON -> source -> JSON, comparing the two trees.
fn assert_roundtrip(source: &str) -> String {
    let tool = PythonAstJsonTool::default();
    let first = encode_bare(source);
    let regenerated = tool.from_json(first.clone()).unwrap();
    assert!(regenerated.warnings.is_empty(), "{:?}", regenerated.warnings);
    let second = tool
        .to_json(&regenerated.source_code, SourceType::Code, Some(false))
        .unwrap_or_else(|e| panic!("regenerated source does not parse: {e}\n{}", regenerated.source_code));
    assert_eq!(
        first["ast"], second["ast"],
        "trees differ for:\n{}",
        regenerated.source_code
    );
    regenerated.source_code
}

// ---
// Fixed scenarios
// ---

#[test]
fn test_function_with_all_defaults_roundtrips() {
    let text = assert_roundtrip("def f(a, b=1, *args, **kwargs): return a + b");
    assert_eq!(text, "def f(a, b=1, *args, **kwargs):\n    return a + b");
}

#[test]
fn test_simple_assignment_roundtrips() {
    assert_eq!(assert_roundtrip("x = 42\n"), "x = 42");
}

#[test]
fn test_empty_module_roundtrips_to_nothing() {
    assert_eq!(assert_roundtrip(""), "");
}

// ---
// Coverage across statement and expression kinds
// ---

#[test]
fn test_statements_roundtrip() {
    for source in [
        "import a.b as c, d\nfrom ..pkg import (x as y, z)\nfrom m import *\n",
        "class C(B, metaclass=M):\n    '''Doc.'''\n    x: int = 1\n    y: 'str'\n\n    @staticmethod\n    def m(*, k=None) -> None:\n        global g\n        g += 1\n",
        "for i, j in pairs:\n    if i:\n        continue\n    elif j:\n        break\nelse:\n    pass\n",
        "while not done:\n    done = step()\nelse:\n    cleanup()\n",
        "try:\n    risky()\nexcept ValueError as e:\n    raise TypeError('bad') from e\nexcept:\n    raise\nelse:\n    ok()\nfinally:\n    close()\n",
        "with open(p) as f, lock:\n    data = f.read()\n",
        "async def main():\n    async for item in stream():\n        await item\n    async with session() as s:\n        return [x async for x in s]\n",
        "def outer():\n    x = 0\n\n    def inner():\n        nonlocal x\n        x = yield x\n        yield from range(x)\n    return inner\n",
        "assert x > 0, 'positive'\ndel a, b[0], c.d\n",
        "x = y = z = 0\na, *rest = items\n(p, q), r = pair, 3\n",
    ] {
        assert_roundtrip(source);
    }
}

#[test]
fn test_expressions_roundtrip() {
    for source in [
        "x = a if cond else b\n",
        "x = lambda a, /, b=2, *c, d, **e: a + b\n",
        "x = -a ** 2 + ~b - (not c)\n",
        "x = a < b <= c != d is not e not in f\n",
        "x = (a and b) or (c and not d)\n",
        "x = {**base, 'k': [1, 2.5, 3j], 'n': None, 't': (True,)}\n",
        "x = {i: j for i, j in zip(a, b) if i if j}\n",
        "x = {i for i in range(10)}\nx = (i for i in range(10))\n",
        "x = f(*args, key=value, **kwargs)\n",
        "x = a[1:2, ::3, ...]\n",
        "x = a.b.c[d](e).f\n",
        "x = f'{name!r:>{width}} and {value:.2f} {{literal}}'\n",
        "x = b'\\x00\\xff' + b'abc'\n",
        "x = 'it\\'s' + \"quote\\\"d\" + 'tab\\tnew\\n'\n",
        "x = 1_000_000 + 0x1F + 0o17 + 0b101 + 1e-05\n",
        "print(*(yield_value for yield_value in v))\n",
        "if (n := len(a)) > 10:\n    pass\n",
        "x = [*a, *b]\n",
    ] {
        assert_roundtrip(source);
    }
}

#[test]
fn test_newer_syntax_roundtrips() {
    for source in [
        "match command.split():\n    case [action]:\n        pass\n    case ['go', direction] | ['move', direction]:\n        pass\n    case Point(x=0, y=0):\n        pass\n    case {'key': value, **rest}:\n        pass\n    case [1, 2, *others]:\n        pass\n    case str() as s if s:\n        pass\n    case None:\n        pass\n    case -1:\n        pass\n    case _:\n        pass\n",
        "try:\n    pass\nexcept* ValueError:\n    pass\n",
        "type Alias[T] = list[T]\n",
        "def first[T, *Ts, **P](x: T) -> T:\n    return x\n",
        "class Box[T: int]:\n    pass\n",
    ] {
        assert_roundtrip(source);
    }
}

// ---
// Through JSON text
// ---

/// Source -> JSON text -> source -> JSON, the path a document takes when it
/// is stored or sent between processes.
fn assert_text_roundtrip(source: &str) -> String {
    let tool = PythonAstJsonTool::default();
    let first = encode_bare(source);
    let text = render_json(&first, false).unwrap();
    let regenerated = tool.from_json(text.as_str()).unwrap();
    let second = tool
        .to_json(&regenerated.source_code, SourceType::Code, Some(false))
        .unwrap_or_else(|e| panic!("regenerated source does not parse: {e}\n{}", regenerated.source_code));
    assert_eq!(first["ast"], second["ast"], "trees differ for:\n{}", regenerated.source_code);
    regenerated.source_code
}

#[test]
fn test_float_precision_survives_text() {
    assert_eq!(
        assert_text_roundtrip("x = 0.9468822170900693\n"),
        "x = 0.9468822170900693"
    );
    assert_text_roundtrip("y = [1e-07, 2.5e+300, 0.1 + 0.2, 5e-324]\n");
}

#[test]
fn test_named_escapes_survive_text() {
    let text = assert_text_roundtrip("s = 'a\\N{EM DASH}b'\n");
    let doc = encode_bare(&text);
    assert_eq!(doc["ast"]["body"][0]["value"]["value"], "a\u{2014}b");
}

#[test]
fn test_crlf_source_survives_text() {
    let text = assert_text_roundtrip("s = 'a\\\r\nb'\r\nt = \"\"\"p\r\nq\"\"\"\r\n");
    let doc = encode_bare(&text);
    assert_eq!(doc["ast"]["body"][0]["value"]["value"], "ab");
    assert_eq!(doc["ast"]["body"][1]["value"]["value"], "p\nq");
}

#[test]
fn test_starred_subscript_survives_text() {
    let text = assert_text_roundtrip("x = a[*b]\ny = a[1, *b]\n");
    let doc = encode_bare(&text);
    let slice = &doc["ast"]["body"][0]["value"]["slice"];
    assert_eq!(slice["node_type"], "Tuple");
    assert_eq!(slice["elts"][0]["node_type"], "Starred");
}

// ---
// Version-gated degradation
// ---

#[test]
fn test_older_target_degrades_with_warnings() {
    let tool = PythonAstJsonTool::new(ToolConfig::default().with_target(PythonVersion::new(3, 7, 0)));
    let doc = encode_bare("match x:\n    case _:\n        pass\ny = (z := 1)\n");
    let output = tool.from_json(doc).unwrap();
    assert_eq!(output.source_code, "pass\ny = 1");
    assert_eq!(output.warnings.len(), 2);
    assert_eq!(output.warnings[0].path, "ast.body[0]");
}
