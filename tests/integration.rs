use std::{env, fs, path::Path, path::PathBuf, process::Command};

const DEMOGRAPHY: &str = r#"
[demography]
life_expectancy = 21900.0
max_age = 36500.0
age_0 = 2920.0
rho = 0.85
min_birth_age = 6570.0
max_birth_age = 14600.0
proportion_maternal_immunity = 0.31
biting_rate_log_mean = 0.0
biting_rate_log_sd = 1.10905365064
"#;

const VIVAX: &str = r#"
[model]
strain = "vivax"
delay = 10.0
time_to_relapse = 41.0
time_to_clear_hypnozoite = 383.0
duration_prophylaxis = 5.0
duration_treatment = 1.0
duration_high_density_infection = 5.0
duration_lm_infection = 16.0
phi_lm = { min = 0.011, max = 0.93, mid = 18.8, steepness = 3.37 }
phi_d = { min = 0.006, max = 0.96, mid = 24.5, steepness = 5.63 }
d_pcr = { min = 10.0, max = 52.6, mid = 9.9, steepness = 3.82 }
chi_t = 0.5
duration_parasite_immunity = 3650.0
duration_clinical_immunity = 10950.0
duration_maternal_immunity = 49.9
end_maternal_immunity = 365.0
refractory_period = 42.4
c_lm = 0.1
c_pcr = 0.035
c_d = 0.8
c_t = 0.4

[vector]
kind = "simple"

[[vector.species]]
name = "anopheles"
state = [20000.0, 0.0, 100.0]
params = { life_expectancy = 10.0, incubation_period = 12.0, biting_rate = 0.25 }
"#;

const FALCIPARUM: &str = r#"
[model]
strain = "falciparum"
delay = 12.0
duration_treatment = 5.0
duration_disease = 5.0
duration_subpatent = 110.0
duration_asymptomatic = 200.0
duration_prophylaxis = 25.0
prob_treatment = 0.2
clinical_immunity_mid = 1.0
clinical_immunity_steepness = 4.13
parasite_immunity_mid = 4732.5
parasite_immunity_steepness = 5.0
asymptomatic_rate_factor = 1.0
duration_parasite_immunity = 3650.0
duration_clinical_immunity = 10950.0
duration_maternal_immunity = 49.9
end_maternal_immunity = 365.0
refractory_period = 7.0
c_a = 0.1
c_u = 0.0062
c_d = 0.068
c_t = 0.022

[vector]
kind = "constant"
eir = 5.0
"#;

const RUN: &str = r#"
[init]
n_agents = 240
time_step = 1.0
eir = 5.0

[output]
steps_per_save = 4
saves_per_file = 16
"#;

fn run_bin(args: &[&str]) {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_plasmodyn"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn basic_workflow(name: &str, model: &str) {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = [DEMOGRAPHY, model, RUN].concat();
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);

    let run_dir = test_dir.join("run-0000");
    for file in [
        "checkpoint.msgpack",
        "trajectory-0000.msgpack",
        "trajectory-0002.msgpack",
        "snapshot-0002.msgpack",
    ] {
        assert!(exists(&run_dir.join(file)), "missing {file}");
    }

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);
    assert!(exists(&run_dir.join("results.msgpack")));
    assert!(exists(&test_dir.join("run-0001").join("results.msgpack")));

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!exists(&run_dir));

    fs::remove_dir_all(&test_dir).ok();
}

fn exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

#[test]
fn vivax_workflow() {
    basic_workflow("vivax_workflow", VIVAX);
}

#[test]
fn falciparum_workflow() {
    basic_workflow("falciparum_workflow", FALCIPARUM);
}
