mod support;

mod script {
    use std::io;
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use futures::FutureExt;
    use redis_scripting::{
        digest, Cmd, ErrorKind, FlushMode, OutputType, RedisError, Script, ScriptDigest,
        ScriptOutput, ScriptingConfig, ScriptingConnection, ServerErrorKind, Value,
    };
    use redis_scripting_test::{
        no_script_error, not_busy_error, redis_value, MockCmd, MockScriptConnection,
    };
    use rstest::rstest;

    use crate::support::*;

    const RETURN_ONE: &str = "return 1";

    fn server_with_return_one() -> FakeScriptServer {
        let server = FakeScriptServer::new();
        server.register(RETURN_ONE, Value::Int(1));
        server
    }

    #[rstest]
    #[case::current_thread(RuntimeType::CurrentThread)]
    #[case::multi_thread(RuntimeType::MultiThread)]
    fn test_eval_then_evalsha_sends_single_evalsha(#[case] runtime: RuntimeType) {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());

        block_on_all(
            async move {
                let first: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                assert_eq!(first, 1);

                let second: i64 = con
                    .evalsha(&digest(RETURN_ONE), OutputType::Integer, (), ())
                    .await?;
                assert_eq!(second, 1);
                Ok(())
            },
            runtime,
        )
        .unwrap();

        assert_eq!(server.calls("EVAL"), 1);
        assert_eq!(server.calls("EVALSHA"), 1);
        assert_eq!(server.total_calls(), 2);
    }

    #[test]
    fn test_repeated_eval_uses_evalsha() {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());

        block_on_all(
            async move {
                for _ in 0..3 {
                    let rv: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                    assert_eq!(rv, 1);
                }
                assert!(con.cache().is_loaded(&ScriptDigest::of(RETURN_ONE)));
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();

        assert_eq!(server.calls("EVAL"), 1);
        assert_eq!(server.calls("EVALSHA"), 2);
    }

    #[test]
    fn test_eval_accepts_bytes_and_text_alike() {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());

        block_on_all(
            async move {
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                let _: i64 = con
                    .eval(RETURN_ONE.as_bytes(), OutputType::Integer, (), ())
                    .await?;
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();

        assert_eq!(server.calls("EVAL"), 1);
        assert_eq!(server.calls("EVALSHA"), 1);
    }

    #[test]
    fn test_keys_and_values_are_forwarded_in_order() {
        let server = FakeScriptServer::new();
        let body = "return {KEYS, ARGV}";
        server.register_handler(body, |keys, args| {
            Value::Array(vec![
                Value::Array(keys.iter().cloned().map(Value::BulkString).collect()),
                Value::Array(args.iter().cloned().map(Value::BulkString).collect()),
            ])
        });
        let mut con = ScriptingConnection::new(server);

        let rv: Vec<Vec<String>> = block_on_all(
            async move {
                con.eval(body, OutputType::Multi, vec!["k1", "k2"], &["v1", "v2", "v3"])
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();

        assert_eq!(rv, vec![vec!["k1", "k2"], vec!["v1", "v2", "v3"]]);
    }

    #[test]
    fn test_evalsha_falls_back_when_body_is_known() {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());
        let sha = digest(RETURN_ONE);

        block_on_all(
            async move {
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                server.forget_all_scripts();

                let rv: i64 = con.evalsha(&sha, OutputType::Integer, (), ()).await?;
                assert_eq!(rv, 1);
                assert!(con.cache().is_loaded(&ScriptDigest::parse(&sha)?));

                assert_eq!(server.calls("EVAL"), 2);
                assert_eq!(server.calls("EVALSHA"), 1);
                assert!(server.is_loaded(RETURN_ONE));
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();
    }

    #[rstest]
    #[case::current_thread(RuntimeType::CurrentThread)]
    #[case::multi_thread(RuntimeType::MultiThread)]
    fn test_stale_cache_hit_falls_back_to_eval(#[case] runtime: RuntimeType) {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());
        let cache = con.cache().clone();

        block_on_all(
            async move {
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                server.forget_all_scripts();

                let rv: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                assert_eq!(rv, 1);
                assert_eq!(server.calls("EVALSHA"), 1);
                assert_eq!(server.calls("EVAL"), 2);
                assert!(server.is_loaded(RETURN_ONE));
                Ok(())
            },
            runtime,
        )
        .unwrap();

        assert!(cache.is_loaded(&ScriptDigest::of(RETURN_ONE)));
    }

    #[test]
    fn test_evalsha_second_noscript_is_surfaced() {
        let sha = ScriptDigest::of(RETURN_ONE);
        let mock = MockScriptConnection::new(vec![
            MockCmd::new(Cmd::evalsha(&sha, (), ()), Err::<Value, _>(no_script_error())),
            MockCmd::new(
                Cmd::eval(RETURN_ONE.as_bytes(), (), ()),
                Err::<Value, _>(no_script_error()),
            ),
        ])
        .assert_all_commands_consumed();
        let mut con = ScriptingConnection::new(mock.clone());
        con.cache().remember(&sha, Arc::from(RETURN_ONE.as_bytes()));
        let cache = con.cache().clone();

        let err = block_on_all(
            async move {
                con.evalsha::<i64, _, _>(sha.as_str(), OutputType::Integer, (), ())
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert!(err.is_no_script());
        assert_eq!(mock.request_count(), 2);
        assert!(!cache.is_loaded(&ScriptDigest::of(RETURN_ONE)));
    }

    #[test]
    fn test_evicted_body_makes_evalsha_script_not_cached() {
        let server = server_with_return_one();
        server.register("return 2", Value::Int(2));
        let config = ScriptingConfig::new().set_max_retained_bodies(NonZeroUsize::new(1).unwrap());
        let mut con = ScriptingConnection::with_config(server.clone(), config);

        let err = block_on_all(
            async move {
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                let _: i64 = con.eval("return 2", OutputType::Integer, (), ()).await?;
                assert_eq!(con.cache().retained_bodies(), 1);
                server.forget_all_scripts();

                // The newest body still recovers.
                let two: i64 = con
                    .evalsha(&digest("return 2"), OutputType::Integer, (), ())
                    .await?;
                assert_eq!(two, 2);

                con.evalsha::<i64, _, _>(&digest(RETURN_ONE), OutputType::Integer, (), ())
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ScriptNotCached);
    }

    #[test]
    fn test_generated_scripts_keep_a_bounded_number_of_bodies() {
        let server = FakeScriptServer::new();
        let config = ScriptingConfig::new().set_max_retained_bodies(NonZeroUsize::new(8).unwrap());
        let mut con = ScriptingConnection::with_config(server.clone(), config);
        let cache = con.cache().clone();

        block_on_all(
            async move {
                for i in 0..100 {
                    let _: ScriptOutput = con
                        .eval(format!("return {i}"), OutputType::Value, (), ())
                        .await?;
                }
                con.script_flush(None).await?;
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();

        assert_eq!(server.calls("EVAL"), 100);
        assert_eq!(format!("{cache:?}"), "ScriptCache { loaded: 0, bodies: 8 }");
    }

    #[test]
    fn test_evalsha_without_body_is_script_not_cached() {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());

        let err = block_on_all(
            async move {
                con.evalsha::<i64, _, _>(&digest(RETURN_ONE), OutputType::Integer, (), ())
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ScriptNotCached);
        assert_eq!(server.calls("EVALSHA"), 1);
        assert_eq!(server.calls("EVAL"), 0);
    }

    #[test]
    fn test_evalsha_rejects_malformed_digest_without_sending() {
        let mock = MockScriptConnection::new(vec![]);
        let mut con = ScriptingConnection::new(mock.clone());

        let err = block_on_all(
            async move {
                con.evalsha::<i64, _, _>("not-a-digest", OutputType::Integer, (), ())
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ClientError);
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_second_noscript_is_surfaced() {
        let sha = ScriptDigest::of(RETURN_ONE);
        let mock = MockScriptConnection::new(vec![
            MockCmd::new(Cmd::eval(RETURN_ONE.as_bytes(), (), ()), Ok(1)),
            MockCmd::new(Cmd::evalsha(&sha, (), ()), Err::<Value, _>(no_script_error())),
            MockCmd::new(
                Cmd::eval(RETURN_ONE.as_bytes(), (), ()),
                Err::<Value, _>(no_script_error()),
            ),
        ])
        .assert_all_commands_consumed();
        let mut con = ScriptingConnection::new(mock.clone());

        let err = block_on_all(
            async move {
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                con.eval::<i64, _, _, _>(RETURN_ONE, OutputType::Integer, (), ())
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert!(err.is_no_script());
        assert_eq!(mock.request_count(), 3);
    }

    #[test]
    fn test_script_exists_preserves_order() {
        let server = FakeScriptServer::new();
        let mut con = ScriptingConnection::new(server.clone());
        let (d1, d2, d3) = (digest("return 1"), digest("return 2"), digest("return 3"));

        let exists = block_on_all(
            async move {
                con.script_load("return 1").await?;
                con.script_load("return 3").await?;
                con.script_exists(&[&d1, &d2, &d3]).await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();

        assert_eq!(exists, vec![true, false, true]);
        assert_eq!(server.calls("SCRIPT EXISTS"), 1);
    }

    #[test]
    fn test_script_exists_of_nothing_sends_nothing() {
        let mock = MockScriptConnection::new(vec![]);
        let mut con = ScriptingConnection::new(mock.clone());

        let exists = block_on_all(
            async move { con.script_exists::<String>(&[]).await },
            RuntimeType::CurrentThread,
        )
        .unwrap();

        assert!(exists.is_empty());
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_script_exists_length_mismatch() {
        let d1 = digest("return 1");
        let d2 = digest("return 2");
        let mock = MockScriptConnection::new(vec![MockCmd::new(
            Cmd::script_exists(&[&d1, &d2]),
            Ok(redis_value!([1])),
        )]);
        let mut con = ScriptingConnection::new(mock);

        let err = block_on_all(
            async move { con.script_exists(&[&d1, &d2]).await },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DecodeMismatch);
    }

    #[test]
    fn test_flush_clears_cache_and_later_calls_recover() {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());
        let sha = digest(RETURN_ONE);

        block_on_all(
            async move {
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                assert_eq!(con.cache().len(), 1);

                assert_eq!(con.script_flush(None).await?, "OK");
                assert!(con.cache().is_empty());
                assert!(!server.is_loaded(RETURN_ONE));

                // Cache miss after the flush, so the body is sent again.
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                assert_eq!(server.calls("EVAL"), 2);
                assert_eq!(server.calls("EVALSHA"), 0);

                assert_eq!(con.script_flush(Some(FlushMode::Sync)).await?, "OK");
                let rv: i64 = con.evalsha(&sha, OutputType::Integer, (), ()).await?;
                assert_eq!(rv, 1);
                assert_eq!(server.calls("EVALSHA"), 1);
                assert_eq!(server.calls("EVAL"), 3);
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();
    }

    #[test]
    fn test_failed_flush_keeps_cache() {
        let mock = MockScriptConnection::new(vec![
            MockCmd::new(Cmd::eval(RETURN_ONE.as_bytes(), (), ()), Ok(1)),
            MockCmd::new(
                Cmd::script_flush(Some(FlushMode::Async)),
                Err::<Value, _>(RedisError::from(io::Error::from(io::ErrorKind::BrokenPipe))),
            ),
        ]);
        let mut con = ScriptingConnection::new(mock);

        block_on_all(
            async move {
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                let err = con.script_flush(Some(FlushMode::Async)).await.unwrap_err();
                assert!(err.is_io_error());
                assert_eq!(con.cache().len(), 1);
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();
    }

    #[test]
    fn test_io_error_leaves_cache_untouched() {
        let mock = MockScriptConnection::new(vec![MockCmd::new(
            Cmd::eval(RETURN_ONE.as_bytes(), (), ()),
            Err::<Value, _>(RedisError::from(io::Error::from(
                io::ErrorKind::ConnectionReset,
            ))),
        )]);
        let mut con = ScriptingConnection::new(mock);
        let cache = con.cache().clone();

        let err = block_on_all(
            async move {
                con.eval::<i64, _, _, _>(RETURN_ONE, OutputType::Integer, (), ())
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert!(err.is_connection_dropped());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cancelled_call_does_not_mark_cache() {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());

        server.hold_requests(true);
        let pending = con
            .eval::<i64, _, _, _>(RETURN_ONE, OutputType::Integer, (), ())
            .now_or_never();
        assert!(pending.is_none());
        assert!(con.cache().is_empty());

        server.hold_requests(false);
        let rv: i64 = block_on_all(
            async move { con.eval(RETURN_ONE, OutputType::Integer, (), ()).await },
            RuntimeType::CurrentThread,
        )
        .unwrap();
        assert_eq!(rv, 1);
        assert_eq!(server.calls("EVALSHA"), 0);
    }

    #[test]
    fn test_clones_share_the_cache_across_tasks() {
        let server = server_with_return_one();
        let con = ScriptingConnection::new(server.clone());
        let cache = con.cache().clone();

        block_on_all(
            async move {
                let mut tasks = Vec::new();
                for _ in 0..8 {
                    let mut con = con.clone();
                    tasks.push(tokio::spawn(async move {
                        con.eval::<i64, _, _, _>(RETURN_ONE, OutputType::Integer, (), ())
                            .await
                    }));
                }
                for task in tasks {
                    assert_eq!(task.await.unwrap()?, 1);
                }
                Ok(())
            },
            RuntimeType::MultiThread,
        )
        .unwrap();

        assert_eq!(cache.len(), 1);
        assert!(server.calls("EVAL") >= 1);
        assert_eq!(server.calls("EVAL") + server.calls("EVALSHA"), 8);
    }

    #[rstest]
    #[case::integer_from_bulk(OutputType::Integer, Value::BulkString(b"1".to_vec()))]
    #[case::integer_from_array(OutputType::Integer, Value::Array(vec![Value::Int(1)]))]
    #[case::value_from_array(OutputType::Value, Value::Array(vec![]))]
    #[case::multi_from_int(OutputType::Multi, Value::Int(3))]
    #[case::status_from_int(OutputType::Status, Value::Int(3))]
    #[case::boolean_from_bulk(OutputType::Boolean, Value::BulkString(b"yes".to_vec()))]
    fn test_mismatched_reply_is_decode_error(#[case] output: OutputType, #[case] reply: Value) {
        let server = FakeScriptServer::new();
        let body = "return something";
        server.register(body, reply);
        let mut con = ScriptingConnection::new(server);

        let err = block_on_all(
            async move {
                let rv = con.eval::<ScriptOutput, _, _, _>(body, output, (), ()).await;
                // The script did run, so the digest is loaded either way.
                assert!(con.cache().is_loaded(&ScriptDigest::of(body)));
                rv
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DecodeMismatch);
    }

    #[rstest]
    #[case::integer(OutputType::Integer, Value::Int(-5), ScriptOutput::Integer(-5))]
    #[case::boolean_true(OutputType::Boolean, Value::Int(1), ScriptOutput::Boolean(true))]
    #[case::boolean_nil(OutputType::Boolean, Value::Nil, ScriptOutput::Boolean(false))]
    #[case::status(
        OutputType::Status,
        Value::Okay,
        ScriptOutput::Status("OK".to_string())
    )]
    #[case::value(
        OutputType::Value,
        Value::BulkString(vec![0, 159, 146, 150]),
        ScriptOutput::Value(vec![0, 159, 146, 150])
    )]
    #[case::multi(
        OutputType::Multi,
        Value::Array(vec![Value::Int(1), Value::Nil, Value::BulkString(b"x".to_vec())]),
        ScriptOutput::Multi(vec![
            ScriptOutput::Integer(1),
            ScriptOutput::Nil,
            ScriptOutput::Value(b"x".to_vec()),
        ])
    )]
    fn test_replies_decode_per_output_type(
        #[case] output: OutputType,
        #[case] reply: Value,
        #[case] expected: ScriptOutput,
    ) {
        let server = FakeScriptServer::new();
        let body = "return something";
        server.register(body, reply);
        let mut con = ScriptingConnection::new(server);

        let rv: ScriptOutput = block_on_all(
            async move { con.eval(body, output, (), ()).await },
            RuntimeType::CurrentThread,
        )
        .unwrap();

        assert_eq!(rv, expected);
    }

    #[test]
    fn test_script_error_reply_is_surfaced() {
        let server = FakeScriptServer::new();
        let body = "return redis.error_reply('boom')";
        server.register(body, Value::ServerError(redis_scripting::ServerError::parse("ERR boom")));
        let mut con = ScriptingConnection::new(server.clone());

        let err = block_on_all(
            async move {
                con.eval::<ScriptOutput, _, _, _>(body, OutputType::Status, (), ())
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert_eq!(
            err.kind(),
            ErrorKind::ServerError(ServerErrorKind::ResponseError)
        );
        assert_eq!(err.detail(), Some("boom"));
        assert_eq!(server.calls("EVAL"), 1);
    }

    #[test]
    fn test_script_kill() {
        let server = FakeScriptServer::new();
        let mut con = ScriptingConnection::new(server.clone());

        block_on_all(
            async move {
                let err = con.script_kill().await.unwrap_err();
                assert!(err.is_server_busy());
                assert_matches!(
                    err.kind(),
                    ErrorKind::ServerError(ServerErrorKind::NotBusy)
                );

                server.set_script_running(true);
                assert_eq!(con.script_kill().await?, "OK");
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();
    }

    #[test]
    fn test_script_kill_with_mock() {
        let mock = MockScriptConnection::new(vec![MockCmd::new(
            Cmd::script_kill(),
            Err::<Value, _>(not_busy_error()),
        )])
        .assert_all_commands_consumed();
        let mut con = ScriptingConnection::new(mock);

        let err = block_on_all(
            async move { con.script_kill().await },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert!(err.is_server_busy());
    }

    #[test]
    fn test_script_load_marks_loaded() {
        let server = server_with_return_one();
        let mut con = ScriptingConnection::new(server.clone());

        block_on_all(
            async move {
                let sha = con.script_load(RETURN_ONE).await?;
                assert_eq!(sha, digest(RETURN_ONE));

                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                assert_eq!(server.calls("SCRIPT LOAD"), 1);
                assert_eq!(server.calls("EVALSHA"), 1);
                assert_eq!(server.calls("EVAL"), 0);
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();
    }

    #[test]
    fn test_script_object() {
        let server = FakeScriptServer::new();
        let body = r"return {redis.call('GET', KEYS[1]), ARGV[1]}";
        server.register_handler(body, |keys, args| {
            assert_eq!(keys, [b"my_key".to_vec()]);
            Value::Array(vec![
                Value::BulkString(b"foo".to_vec()),
                Value::BulkString(args[0].clone()),
            ])
        });
        let mut con = ScriptingConnection::new(server.clone());
        let script = Script::new(body);

        block_on_all(
            async move {
                let hash = script.prepare_invoke().load_async(&mut con).await?;
                assert_eq!(hash, script.get_hash());

                let rv: Vec<String> = script
                    .key("my_key")
                    .arg(42)
                    .invoke_async(&mut con, OutputType::Multi)
                    .await?;
                assert_eq!(rv, vec!["foo".to_string(), "42".to_string()]);

                assert_eq!(server.calls("SCRIPT LOAD"), 1);
                assert_eq!(server.calls("EVALSHA"), 1);
                assert_eq!(server.calls("EVAL"), 0);
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();
    }

    #[test]
    fn test_evalsha_disabled_always_sends_body() {
        let server = server_with_return_one();
        let config = ScriptingConfig::new().set_use_evalsha_on_cache_hit(false);
        let mut con = ScriptingConnection::with_config(server.clone(), config);

        block_on_all(
            async move {
                for _ in 0..3 {
                    let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                }
                Ok(())
            },
            RuntimeType::CurrentThread,
        )
        .unwrap();

        assert_eq!(server.calls("EVAL"), 3);
        assert_eq!(server.calls("EVALSHA"), 0);
    }

    #[test]
    fn test_without_retained_bodies_evalsha_cannot_recover() {
        let server = server_with_return_one();
        let config = ScriptingConfig::new().set_retain_script_bodies(false);
        let mut con = ScriptingConnection::with_config(server.clone(), config);
        let sha = digest(RETURN_ONE);

        let err = block_on_all(
            async move {
                let _: i64 = con.eval(RETURN_ONE, OutputType::Integer, (), ()).await?;
                con.script_flush(None).await?;
                con.evalsha::<i64, _, _>(&sha, OutputType::Integer, (), ())
                    .await
            },
            RuntimeType::CurrentThread,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ScriptNotCached);
        assert_eq!(server.calls("EVAL"), 1);
    }
}
