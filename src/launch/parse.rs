//! Map a `docker run` argument vector back onto a `LaunchSpec`.

use std::str::FromStr;

use tracing::warn;

use crate::lib::errors::ParseError;

use super::{
    render::RUN_SUBCOMMAND,
    spec::{parse_env_pair, GpuSelection, Mount, PortMapping},
    LaunchSpec,
};

/// Flags accepted for compatibility with interactive scripts but not modelled.
const IGNORED_CONTAINER_FLAGS: &[&str] = &["-i", "-t", "-it", "-ti", "--interactive", "--tty"];

/// Parse `[wrapper...] [program] run <container flags> <image> <server flags>`.
///
/// Everything before the first `run` token is the runtime command, so
/// wrappers such as `sudo -E docker run` are accepted. Unknown server flags are kept verbatim in `extra_args`; unknown container
/// flags are rejected because their arity is unknown.
pub fn parse_argv<S: AsRef<str>>(argv: &[S]) -> Result<LaunchSpec, ParseError> {
    let tokens: Vec<&str> = argv.iter().map(AsRef::as_ref).collect();
    let start = tokens
        .iter()
        .position(|token| *token == RUN_SUBCOMMAND)
        .ok_or(ParseError::MissingRunSubcommand)?;

    let mut spec = LaunchSpec::default();
    let mut cursor = Cursor::new(&tokens[start + 1..]);

    while let Some(token) = cursor.advance() {
        if !token.starts_with('-') {
            spec.image = token.to_string();
            break;
        }
        let (flag, inline) = split_inline(token);
        match flag {
            "--gpus" => {
                let value = cursor.value(flag, inline)?;
                spec.gpus = Some(parse_gpus(flag, value)?);
            }
            "--shm-size" => spec.shm_size = Some(cursor.value(flag, inline)?.to_string()),
            "-p" | "--publish" => {
                let value = cursor.value(flag, inline)?;
                spec.port = Some(parse_port(flag, value)?);
            }
            "-v" | "--volume" => {
                let value = cursor.value(flag, inline)?;
                let mount = Mount::from_str(value).map_err(|message| invalid(flag, value, message))?;
                spec.mounts.push(mount);
            }
            "-e" | "--env" => {
                let value = cursor.value(flag, inline)?;
                let pair = parse_env_pair(value).map_err(|message| invalid(flag, value, message))?;
                spec.env.push(pair);
            }
            "--name" => spec.container_name = Some(cursor.value(flag, inline)?.to_string()),
            "--entrypoint" => spec.entrypoint = Some(cursor.value(flag, inline)?.to_string()),
            "--rm" => spec.remove_on_exit = true,
            "-d" | "--detach" => spec.detach = true,
            ignored if IGNORED_CONTAINER_FLAGS.contains(&ignored) => {
                warn!(
                    target: "tgi_launch::launch",
                    flag = ignored,
                    "Ignoring interactive container flag"
                );
            }
            other => {
                return Err(ParseError::UnsupportedFlag {
                    flag: other.to_string(),
                })
            }
        }
    }

    if spec.image.is_empty() {
        return Err(ParseError::MissingImage);
    }

    while let Some(token) = cursor.advance() {
        let (flag, inline) = split_inline(token);
        match flag {
            "--model-id" => spec.model_id = cursor.value(flag, inline)?.to_string(),
            "--revision" => spec.revision = Some(cursor.value(flag, inline)?.to_string()),
            "--num-shard" => spec.num_shard = Some(cursor.parsed(flag, inline)?),
            "--quantize" => spec.quantize = Some(cursor.parsed(flag, inline)?),
            "--dtype" => spec.dtype = Some(cursor.parsed(flag, inline)?),
            "--trust-remote-code" => spec.trust_remote_code = true,
            "--rope-scaling" => spec.rope_scaling = Some(cursor.parsed(flag, inline)?),
            "--rope-factor" => spec.rope_factor = Some(cursor.parsed(flag, inline)?),
            "--max-input-length" => spec.max_input_length = Some(cursor.parsed(flag, inline)?),
            "--max-total-tokens" => spec.max_total_tokens = Some(cursor.parsed(flag, inline)?),
            "--max-batch-prefill-tokens" => {
                spec.max_batch_prefill_tokens = Some(cursor.parsed(flag, inline)?)
            }
            "--max-batch-total-tokens" => {
                spec.max_batch_total_tokens = Some(cursor.parsed(flag, inline)?)
            }
            "--max-stop-sequences" => {
                spec.max_stop_sequences = Some(cursor.parsed(flag, inline)?)
            }
            _ => spec.extra_args.push(token.to_string()),
        }
    }

    if spec.model_id.is_empty() {
        return Err(ParseError::MissingModelId);
    }
    Ok(spec)
}

struct Cursor<'a> {
    tokens: &'a [&'a str],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [&'a str]) -> Self {
        Self { tokens, index: 0 }
    }

    fn advance(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.index).copied();
        self.index += 1;
        token
    }

    /// Value from `--flag=value` or from the following token.
    fn value(&mut self, flag: &str, inline: Option<&'a str>) -> Result<&'a str, ParseError> {
        if let Some(value) = inline {
            return Ok(value);
        }
        self.advance().ok_or_else(|| ParseError::MissingValue {
            flag: flag.to_string(),
        })
    }

    fn parsed<T>(&mut self, flag: &str, inline: Option<&'a str>) -> Result<T, ParseError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        let value = self.value(flag, inline)?;
        value
            .parse::<T>()
            .map_err(|err| invalid(flag, value, err.to_string()))
    }
}

fn split_inline(token: &str) -> (&str, Option<&str>) {
    if token.starts_with("--") {
        if let Some((flag, value)) = token.split_once('=') {
            return (flag, Some(value));
        }
    }
    (token, None)
}

fn parse_gpus(flag: &str, value: &str) -> Result<GpuSelection, ParseError> {
    let unquoted = value.trim_matches(|c: char| c == '"' || c == '\'');
    if unquoted != "all" && !unquoted.starts_with("device=") {
        return Err(invalid(
            flag,
            value,
            "only `all` and `device=<list>` selections are supported".into(),
        ));
    }
    GpuSelection::from_str(value).map_err(|message| invalid(flag, value, message))
}

fn parse_port(flag: &str, value: &str) -> Result<PortMapping, ParseError> {
    let (published, container) = value
        .split_once(':')
        .ok_or_else(|| invalid(flag, value, "expected `host_port:container_port`".into()))?;
    let published = published
        .parse::<u16>()
        .map_err(|err| invalid(flag, value, err.to_string()))?;
    let container = container
        .parse::<u16>()
        .map_err(|err| invalid(flag, value, err.to_string()))?;
    Ok(PortMapping {
        published,
        container,
    })
}

fn invalid(flag: &str, value: &str, message: String) -> ParseError {
    ParseError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{
        spec::tests::llama2_spec, ContainerInvocation, Dtype, Quantize, RopeScaling,
    };

    fn split(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn rendered_argv_parses_back_to_the_same_spec() {
        let specs = [
            llama2_spec(),
            LaunchSpec {
                gpus: Some(GpuSelection::All),
                mounts: vec![
                    Mount::new("/data/models", "/models"),
                    Mount {
                        readonly: true,
                        ..Mount::new("/data/cache", "/cache")
                    },
                ],
                env: vec![("HF_HUB_OFFLINE".into(), "1".into())],
                container_name: Some("tgi-llama2".into()),
                remove_on_exit: true,
                detach: true,
                entrypoint: Some("/usr/local/bin/start-shell.sh".into()),
                revision: Some("main".into()),
                quantize: Some(Quantize::BitsandbytesNf4),
                trust_remote_code: true,
                rope_scaling: Some(RopeScaling::Linear),
                rope_factor: Some(2.5),
                max_batch_total_tokens: Some(65536),
                extra_args: vec!["--max-best-of".into(), "1".into()],
                ..llama2_spec()
            },
            LaunchSpec {
                image: "img:1.4".into(),
                model_id: "/models/shell-7b".into(),
                dtype: Some(Dtype::Bfloat16),
                ..LaunchSpec::default()
            },
        ];

        for spec in specs {
            let argv = ContainerInvocation::from_spec(&spec).argv();
            let parsed = parse_argv(&argv).expect("rendered argv should parse");
            assert_eq!(parsed, spec, "argv: {argv:?}");
        }
    }

    #[test]
    fn script_style_invocation_is_understood() {
        let argv = split(
            "docker run -it --gpus '\"device=0,1\"' --shm-size 1g -p 9123:80 \
             -v /data:/data -e HUGGING_FACE_HUB_TOKEN=hf_x \
             ghcr.io/huggingface/text-generation-inference:1.4 \
             --model-id=/data/llama2-7b --num-shard 2 --rope-scaling dynamic --rope-factor 8",
        );
        let spec = parse_argv(&argv).expect("script should parse");
        assert_eq!(spec.image, "ghcr.io/huggingface/text-generation-inference:1.4");
        assert_eq!(spec.gpus, Some(GpuSelection::devices([0, 1])));
        assert_eq!(
            spec.port,
            Some(PortMapping {
                published: 9123,
                container: 80
            })
        );
        assert_eq!(spec.mounts, vec![Mount::new("/data", "/data")]);
        assert_eq!(
            spec.env,
            vec![("HUGGING_FACE_HUB_TOKEN".to_string(), "hf_x".to_string())]
        );
        assert_eq!(spec.model_id, "/data/llama2-7b");
        assert_eq!(spec.num_shard, Some(2));
        assert_eq!(spec.rope_factor, Some(8.0));
        assert!(spec.extra_args.is_empty());
    }

    #[test]
    fn wrapped_runtime_command_is_skipped() {
        for line in [
            "sudo docker run img:1.4 --model-id m",
            "sudo -E podman --remote run img:1.4 --model-id m",
        ] {
            let spec = parse_argv(&split(line)).expect("wrapped invocation should parse");
            assert_eq!(spec.image, "img:1.4", "{line}");
            assert_eq!(spec.model_id, "m", "{line}");
        }
    }

    #[test]
    fn unknown_container_flag_is_rejected() {
        let err = parse_argv(&split("run --network host img:1.4 --model-id m"))
            .expect_err("unknown flag");
        assert_eq!(
            err,
            ParseError::UnsupportedFlag {
                flag: "--network".into()
            }
        );
    }

    #[test]
    fn gpu_count_is_rejected() {
        let err = parse_argv(&split("run --gpus 2 img:1.4 --model-id m")).expect_err("count");
        assert!(matches!(err, ParseError::InvalidValue { flag, .. } if flag == "--gpus"));
    }

    #[test]
    fn missing_pieces_are_reported() {
        assert_eq!(
            parse_argv(&split("docker pull img:1.4")),
            Err(ParseError::MissingRunSubcommand)
        );
        assert_eq!(
            parse_argv(&split("run --rm")),
            Err(ParseError::MissingImage)
        );
        assert_eq!(
            parse_argv(&split("run img:1.4 --num-shard 1")),
            Err(ParseError::MissingModelId)
        );
        assert_eq!(
            parse_argv(&split("run img:1.4 --model-id")),
            Err(ParseError::MissingValue {
                flag: "--model-id".into()
            })
        );
        assert!(matches!(
            parse_argv(&split("run img:1.4 --model-id m --num-shard two")),
            Err(ParseError::InvalidValue { .. })
        ));
    }
}
