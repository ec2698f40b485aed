#[cfg(test)]
mod resolver_tests {
    use std::collections::HashMap;

    use tree_lox as lox;

    use lox::ast::Stmt;
    use lox::error::LoxError;
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;

    fn parse(source: &str) -> Vec<Stmt> {
        let tokens = Scanner::new(source.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .expect("scan error");

        Parser::new(tokens).parse().expect("parse error")
    }

    /// Resolves `source` with a fresh interpreter and returns the recorded
    /// depth map.
    fn resolve(statements: &[Stmt]) -> Result<HashMap<usize, usize>, LoxError> {
        let mut interpreter = Interpreter::new();

        Resolver::new(&mut interpreter).resolve(statements)?;

        Ok(interpreter.locals().clone())
    }

    fn resolve_error(source: &str) -> String {
        let statements = parse(source);

        match resolve(&statements) {
            Err(e @ LoxError::Resolve { .. }) => e.to_string(),
            other => panic!("expected a resolve error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolver_01_globals_are_not_recorded() {
        let statements = parse("var a = 1; print a;");
        let locals = resolve(&statements).expect("resolve failed");

        assert!(locals.is_empty());
    }

    #[test]
    fn test_resolver_02_block_local_depth() {
        let statements = parse("{ var a = 1; print a; { print a; } }");
        let locals = resolve(&statements).expect("resolve failed");

        // `print a;` in the declaring block hops 0 frames, the nested one 1.
        let mut depths: Vec<usize> = locals.values().copied().collect();
        depths.sort_unstable();

        assert_eq!(depths, vec![0, 1]);
    }

    #[test]
    fn test_resolver_03_closure_capture_depth() {
        let statements = parse("{ var a = 1; fun f() { print a; } f(); }");
        let locals = resolve(&statements).expect("resolve failed");

        // Inside `f`, `a` is one scope above the function body; `f` itself
        // resolves at depth 0 in the block.
        assert!(locals.values().any(|depth| *depth == 1));
        assert!(locals.values().any(|depth| *depth == 0));
    }

    #[test]
    fn test_resolver_04_determinism() {
        let statements =
            parse("{ var a = 1; fun f(b) { { var c = a + b; print c; } } f(2); }");

        let first = resolve(&statements).expect("resolve failed");
        let second = resolve(&statements).expect("resolve failed");

        assert_eq!(first, second);
    }

    #[test]
    fn test_resolver_05_self_read_in_initializer() {
        let message = resolve_error("{ var a = 1; { var a = a; } }");

        assert_eq!(
            message,
            "[line 1] at 'a' Can't read local variable in its own initializer."
        );
    }

    #[test]
    fn test_resolver_06_redeclaration_in_same_scope_is_allowed() {
        let statements = parse("{ var a = 1; var a = 2; print a; }");

        assert!(resolve(&statements).is_ok());
    }

    #[test]
    fn test_resolver_07_return_outside_function() {
        let message = resolve_error("return 1;");

        assert_eq!(
            message,
            "[line 1] at 'return' Can't return from top-level code."
        );
    }

    #[test]
    fn test_resolver_08_return_value_from_initializer() {
        let message = resolve_error("class C { init() { return 1; } }");

        assert_eq!(
            message,
            "[line 1] at 'return' Can't return a value from an initializer."
        );
    }

    #[test]
    fn test_resolver_09_bare_return_from_initializer_is_allowed() {
        let statements = parse("class C { init() { return; } }");

        assert!(resolve(&statements).is_ok());
    }

    #[test]
    fn test_resolver_10_this_outside_class() {
        let message = resolve_error("print this;");

        assert_eq!(message, "[line 1] at 'this' Can't use 'this' outside of a class.");

        let message = resolve_error("fun f() { return this; }");

        assert_eq!(message, "[line 1] at 'this' Can't use 'this' outside of a class.");
    }

    #[test]
    fn test_resolver_11_super_misuse() {
        let message = resolve_error("print super.x;");

        assert_eq!(
            message,
            "[line 1] at 'super' Can't use 'super' outside of a class."
        );

        let message = resolve_error("class A { m() { return super.m(); } }");

        assert_eq!(
            message,
            "[line 1] at 'super' Can't use 'super' in a class with no superclass."
        );
    }

    #[test]
    fn test_resolver_12_class_inheriting_from_itself() {
        let message = resolve_error("class A < A {}");

        assert_eq!(message, "[line 1] at 'A' A class can't inherit from itself.");
    }

    #[test]
    fn test_resolver_13_break_outside_loop() {
        let message = resolve_error("break;");

        assert_eq!(message, "[line 1] at 'break' Break must be inside a loop.");

        // A function body resets the loop context.
        let message = resolve_error("while (true) { fun f() { break; } }");

        assert_eq!(message, "[line 1] at 'break' Break must be inside a loop.");
    }

    #[test]
    fn test_resolver_14_break_inside_loop_is_allowed() {
        let statements = parse("while (true) { break; } for (;;) break;");

        assert!(resolve(&statements).is_ok());
    }

    #[test]
    fn test_resolver_15_this_and_super_resolve_in_methods() {
        let statements = parse(
            "class A { m() { return 1; } } class B < A { m() { return this.n + super.m(); } }",
        );

        let locals = resolve(&statements).expect("resolve failed");

        // Both `this` and `super` are bound as locals inside the method.
        assert!(locals.len() >= 2);
    }
}
