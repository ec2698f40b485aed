#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tree_lox as lox;

    use lox::error::{LoxError, RuntimeError};
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;

    /// Runs a program through the full pipeline and collects `print` output.
    fn execute(source: &str, cross_add: bool) -> Result<String, LoxError> {
        let tokens = Scanner::new(source.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .expect("scan error");

        let statements = Parser::new(tokens).parse().expect("parse error");

        let mut interpreter = Interpreter::new();
        interpreter.set_cross_add(cross_add);

        let sink = Rc::new(RefCell::new(Vec::new()));
        interpreter.set_output(Rc::clone(&sink));

        Resolver::new(&mut interpreter).resolve(&statements)?;
        interpreter.interpret(&statements)?;

        let output = sink.borrow().clone();
        Ok(String::from_utf8(output).expect("print output is utf-8"))
    }

    fn run(source: &str) -> String {
        execute(source, false).expect("program failed")
    }

    fn run_runtime_error(source: &str) -> RuntimeError {
        match execute(source, false) {
            Err(LoxError::Runtime(e)) => e,
            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions and statements
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("print 1 + 2;"), "3\n");
        assert_eq!(run("print 2 / 4;"), "0.5\n");
        assert_eq!(run("print -3 * 2;"), "-6\n");
        assert_eq!(run("print 3.14;"), "3.14\n");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run("print \"foo\" + \"bar\";"), "foobar\n");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("print 1 < 2; print 2 <= 2; print 3 > 4;"), "true\ntrue\nfalse\n");
        assert_eq!(run("print \"a\" < \"b\"; print \"b\" <= \"a\";"), "true\nfalse\n");
    }

    #[test]
    fn test_equality_laws() {
        assert_eq!(run("print nil == nil;"), "true\n");
        assert_eq!(run("print 0 == \"0\";"), "false\n");
        assert_eq!(run("print 1 == 1; print \"x\" != \"y\";"), "true\ntrue\n");
        assert_eq!(run("print (0 / 2) == (0 / 2);"), "true\n");
    }

    #[test]
    fn test_instances_compare_by_identity() {
        assert_eq!(
            run("class A {} var x = A(); var y = A(); print x == y; print x == x;"),
            "false\ntrue\n"
        );
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(
            run("print !nil; print !false; print !0; print !\"\";"),
            "true\ntrue\nfalse\nfalse\n"
        );
    }

    #[test]
    fn test_ternary() {
        assert_eq!(run("print 1 < 2 ? \"yes\" : \"no\";"), "yes\n");
        assert_eq!(run("print nil ? \"yes\" : \"no\";"), "no\n");
    }

    #[test]
    fn test_short_circuit() {
        let source = "
            fun side() { print \"evaluated\"; return true; }
            print false and side();
            print true or side();
        ";

        assert_eq!(run(source), "false\ntrue\n");
    }

    #[test]
    fn test_block_scoping() {
        assert_eq!(
            run("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn test_assignment_returns_value() {
        assert_eq!(run("var a = 1; print a = 5; print a;"), "5\n5\n");
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(
            run("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_for_loop() {
        assert_eq!(run("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
    }

    #[test]
    fn test_break() {
        assert_eq!(
            run("var i = 0; while (true) { i = i + 1; if (i >= 3) break; } print i;"),
            "3\n"
        );

        // The increment clause is skipped once the loop breaks.
        assert_eq!(
            run("for (var i = 0; ; i = i + 1) { if (i > 1) break; print i; }"),
            "0\n1\n"
        );
    }

    #[test]
    fn test_break_only_exits_innermost_loop() {
        let source = "
            for (var i = 0; i < 2; i = i + 1) {
                for (var j = 0; j < 10; j = j + 1) {
                    if (j == 1) break;
                    print i + j;
                }
            }
        ";

        assert_eq!(run(source), "0\n1\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Functions and closures
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_recursion() {
        assert_eq!(
            run("fun f(n) { if (n <= 1) return 1; return n * f(n - 1); } print f(5);"),
            "120\n"
        );
    }

    #[test]
    fn test_return_inside_loop() {
        assert_eq!(
            run("fun f() { while (true) { return \"done\"; } } print f();"),
            "done\n"
        );
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(run("fun f() {} print f();"), "nil\n");
    }

    #[test]
    fn test_closure_counter() {
        let source = "
            fun c() { var i = 0; fun inc() { i = i + 1; return i; } return inc; }
            var x = c();
            print x();
            print x();
        ";

        assert_eq!(run(source), "1\n2\n");
    }

    #[test]
    fn test_closures_capture_distinct_environments() {
        let source = "
            fun c() { var i = 0; fun inc() { i = i + 1; return i; } return inc; }
            var a = c();
            var b = c();
            a(); a();
            print a();
            print b();
        ";

        assert_eq!(run(source), "3\n1\n");
    }

    #[test]
    fn test_closure_captures_declaration_site_binding() {
        let source = "
            var a = \"g\";
            {
                fun f() { print a; }
                var a = \"l\";
                f();
            }
        ";

        assert_eq!(run(source), "g\n");
    }

    #[test]
    fn test_callable_stringify() {
        assert_eq!(
            run("fun f() {} class A {} print f; print clock; print A;"),
            "<fn f>\n<native fn>\n<class A>\n"
        );
    }

    #[test]
    fn test_clock_returns_a_number() {
        assert_eq!(run("print clock() > 0;"), "true\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Classes
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_fields_and_methods() {
        let source = "
            class P {
                init(n) { this.n = n; }
                get() { return this.n; }
            }
            var p = P(7);
            print p.get();
            p.n = 8;
            print p.get();
        ";

        assert_eq!(run(source), "7\n8\n");
    }

    #[test]
    fn test_instance_stringify() {
        assert_eq!(run("class A {} print A();"), "<A instance>\n");
    }

    #[test]
    fn test_initializer_early_return_yields_instance() {
        assert_eq!(run("class C { init() { return; } } print C();"), "<C instance>\n");
    }

    #[test]
    fn test_method_inheritance() {
        assert_eq!(
            run("class A { m() { return \"A\"; } } class B < A {} print B().m();"),
            "A\n"
        );
    }

    #[test]
    fn test_super_dispatch() {
        let source = "
            class A { greet() { print \"hi\"; } }
            class B < A { greet() { super.greet(); print \"bye\"; } }
            B().greet();
        ";

        assert_eq!(run(source), "hi\nbye\n");
    }

    #[test]
    fn test_bound_method_keeps_this() {
        let source = "
            class P {
                init(n) { this.n = n; }
                get() { return this.n; }
            }
            var m = P(3).get;
            print m();
        ";

        assert_eq!(run(source), "3\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lists and dictionaries
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_list_literals_and_subscript() {
        assert_eq!(run("var l = [10, 20]; print l[1];"), "20\n");
        assert_eq!(run("var l = [10, 20, 30]; l[2] = 5; print l;"), "[10, 20, 5]\n");
        assert_eq!(run("print [1, [2, 3]];"), "[1, [2, 3]]\n");
    }

    #[test]
    fn test_dict_literals_and_access() {
        assert_eq!(run("var d = {\"x\": 1}; print d.x;"), "1\n");
        assert_eq!(run("var d = {x: 1, y: 2}; print d[\"y\"];"), "2\n");
        assert_eq!(run("var d = {}; d.a = 1; d[\"b\"] = 2; print d;"), "{a: 1, b: 2}\n");
    }

    #[test]
    fn test_dict_stringify_is_key_sorted() {
        assert_eq!(run("print {b: 2, a: 1};"), "{a: 1, b: 2}\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cross-addition mode
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_cross_add_disabled_by_default() {
        let e = run_runtime_error("print \"a\" + 1;");

        assert_eq!(e.message, "Operands must be two numbers or two strings.");
    }

    #[test]
    fn test_cross_add_enabled() {
        assert_eq!(execute("print \"a\" + 1;", true).unwrap(), "a1\n");
        assert_eq!(execute("print 2 + \"b\";", true).unwrap(), "2b\n");
        assert_eq!(execute("print \"n=\" + 1.5;", true).unwrap(), "n=1.5\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Runtime errors
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_unary_operand_must_be_number() {
        let e = run_runtime_error("print -\"a\";");

        assert_eq!(e.message, "Operand must be a number.");
    }

    #[test]
    fn test_division_by_zero() {
        let e = run_runtime_error("print 1 / 0;");

        assert_eq!(e.message, "Division by zero.");
    }

    #[test]
    fn test_undefined_variable() {
        let e = run_runtime_error("print missing;");

        assert_eq!(e.message, "Undefined variable 'missing'.");
        assert_eq!(e.lexeme, "missing");
    }

    #[test]
    fn test_assignment_does_not_auto_define() {
        let e = run_runtime_error("missing = 1;");

        assert_eq!(e.message, "Undefined variable 'missing'.");
    }

    #[test]
    fn test_calling_a_non_callable() {
        let e = run_runtime_error("\"abc\"();");

        assert_eq!(e.message, "Can only call functions and classes.");
    }

    #[test]
    fn test_arity_mismatch() {
        let e = run_runtime_error("fun f(a, b) {} f(1);");

        assert_eq!(e.message, "Expected 2 arguments but got 1.");
    }

    #[test]
    fn test_undefined_property() {
        let e = run_runtime_error("class A {} print A().missing;");

        assert_eq!(e.message, "Undefined property 'missing'.");
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let e = run_runtime_error("var NotClass = 1; class A < NotClass {}");

        assert_eq!(e.message, "Superclass must be a class.");
    }

    #[test]
    fn test_list_index_out_of_range() {
        let e = run_runtime_error("var l = [1]; print l[1];");

        assert_eq!(e.message, "Index out of range: 1");

        let e = run_runtime_error("var l = [1]; print l[0.5];");

        assert_eq!(e.message, "Index out of range: 0.5");
    }

    #[test]
    fn test_dict_key_must_be_string() {
        let e = run_runtime_error("var d = {x: 1}; print d[0];");

        assert_eq!(e.message, "Property name must be a string.");
    }

    #[test]
    fn test_dict_missing_key() {
        let e = run_runtime_error("var d = {x: 1}; print d[\"y\"];");

        assert_eq!(e.message, "Undefined property 'y'.");
    }

    #[test]
    fn test_duplicate_dictionary_key() {
        let e = run_runtime_error("var d = {a: 1, a: 2};");

        assert_eq!(e.message, "Duplicate key in dictionary.");
    }

    #[test]
    fn test_subscript_on_scalar() {
        let e = run_runtime_error("var n = 1; print n[0];");

        assert_eq!(e.message, "Only dictionaries or list can have properties.");
    }

    #[test]
    fn test_runtime_error_carries_call_stack() {
        let source = "
            fun boom() { return 1 / 0; }
            fun outer() { return boom(); }
            outer();
        ";

        let e = run_runtime_error(source);

        assert_eq!(e.message, "Division by zero.");

        let names: Vec<&str> = e.stack.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["<fn outer>", "<fn boom>"]);

        // Rendered innermost first.
        let rendered = e.to_string();
        let boom_pos = rendered.find("<fn boom>").expect("missing frame");
        let outer_pos = rendered.find("<fn outer>").expect("missing frame");
        assert!(boom_pos < outer_pos);
    }

    #[test]
    fn test_call_stack_is_unwound_after_errors() {
        // The first call fails, but the stack must be clean for the second.
        let source = "
            fun boom() { return 1 / 0; }
            boom();
        ";

        let e = run_runtime_error(source);
        assert_eq!(e.stack.len(), 1);

        let e = run_runtime_error("fun ok() { return 1; } ok(); print 1 / 0;");
        assert!(e.stack.is_empty());
    }

    #[test]
    fn test_environments_are_restored_after_runtime_errors() {
        let e = run_runtime_error("var a = 1; { var a = 2; print missing; }");
        assert_eq!(e.message, "Undefined variable 'missing'.");
    }
}
