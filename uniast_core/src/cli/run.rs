//! `parse` command handler: wires `PipelineOptions` from the resolved
//! config+flags, drives the work distributor once per discovered
//! module, merges the results, and writes the final JSON per
//! `--monorepo-mode` (§6).

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cli::args::{Cli, MonorepoMode, ParseArgs};
use crate::cli::args::Language as CliLanguage;
use crate::config::UniastConfig;
use crate::errors::{IndexError, RunOutcome};
use crate::model::Repository;
use crate::pipeline::{self, FrontEnd, PipelineOptions};
use crate::workdist::{self, DistributorOptions, WorkerContext};

pub async fn run_parse(global: &Cli, args: &ParseArgs) -> RunOutcome {
    let repo_dir = &args.repo_dir;
    let config = match &global.config {
        Some(path) => UniastConfig::load_from_path(path),
        None => UniastConfig::load(repo_dir),
    };

    let front_end = match args.language {
        CliLanguage::Go => FrontEnd::Go,
        CliLanguage::Typescript => FrontEnd::TypeScript,
    };

    let mut excludes = config.discovery.excludes.clone();
    excludes.extend(args.excludes.iter().cloned());

    let options = PipelineOptions {
        front_end,
        repo_dir: repo_dir.clone(),
        refer_code_depth: args.refer_code_depth,
        include_tests: args.need_test,
        collect_comments: args.collect_comment,
        exclude_patterns: excludes,
        load_by_packages: args.load_by_packages,
        tsconfig: args.tsconfig.clone(),
        no_dist: args.no_dist,
        src_globs: args.src.clone(),
    };

    let modules = match pipeline::discover_modules(&options) {
        Ok(modules) if !modules.is_empty() => modules,
        Ok(_) => return RunOutcome::HardFailure(vec![IndexError::ModuleNotFound(repo_dir.display().to_string())]),
        Err(e) => return RunOutcome::HardFailure(vec![e]),
    };

    let cpu_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let worker_binary = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("uniast"));
    let output_dir = args
        .output
        .as_ref()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("output"));

    let mut combined = Repository::new(repo_dir.display().to_string(), repo_dir.display().to_string());
    let mut errors: Vec<IndexError> = Vec::new();
    let mut timed_out = false;

    for module in &modules {
        let metrics = pipeline::compute_project_metrics(repo_dir, module, options.front_end);
        let package_paths: Vec<String> = module.packages.iter().map(|p| p.pkg_path.clone()).collect();

        let worker_context = WorkerContext {
            language: options.front_end.as_str().to_string(),
            workspace_root: repo_dir.join(&module.dir),
            module_name: module.name.clone(),
            refer_code_depth: options.refer_code_depth,
            include_tests: options.include_tests,
            collect_comments: options.collect_comments,
            exclude_patterns: options.exclude_patterns.clone(),
        };

        let distributor_options = DistributorOptions {
            worker_binary: worker_binary.clone(),
            output_dir: output_dir.clone(),
            aggregation: workdist::AggregationMode::Combined,
            override_worker_count: args.workers,
            worker_context,
        };

        // `single_process_fn` always lowers the whole module (the
        // distributor's `packages` argument exists for the worker-pool
        // path's batching; SingleProcess strategy implies a small
        // enough project that re-discovering nothing and lowering
        // directly is cheaper than reconciling a subset).
        let collected = Rc::new(RefCell::new(Vec::<IndexError>::new()));
        let collected_for_closure = Rc::clone(&collected);
        let options_for_closure = options.clone();
        let module_for_closure = module.clone();

        let outcome = workdist::run_distributed(&metrics, package_paths, cpu_count, &distributor_options, move |_| {
            let (repo, errs) = pipeline::lower_module(&options_for_closure, &module_for_closure);
            collected_for_closure.borrow_mut().extend(errs);
            Ok(repo)
        })
        .await;

        errors.extend(Rc::try_unwrap(collected).map(|c| c.into_inner()).unwrap_or_default());
        errors.extend(outcome.errors);
        timed_out |= outcome.timed_out;
        if let Some(fragment) = outcome.combined {
            combined.merge(fragment);
        }
    }

    let final_repository = pipeline::finalize_repository(combined);

    if final_repository.modules.is_empty() {
        errors.push(IndexError::ProcessingIncomplete);
        return RunOutcome::HardFailure(errors);
    }
    if timed_out {
        errors.push(IndexError::WorkerTimeout);
    }

    if let Err(e) = write_output(&final_repository, args, repo_dir) {
        errors.push(e);
        return RunOutcome::HardFailure(errors);
    }

    if errors.is_empty() {
        RunOutcome::Clean
    } else {
        RunOutcome::SucceededWithErrors(errors)
    }
}

fn write_output(repository: &Repository, args: &ParseArgs, repo_dir: &Path) -> Result<(), IndexError> {
    match args.monorepo_mode {
        MonorepoMode::Combined => {
            let path = args.output.clone().unwrap_or_else(|| default_output_path(repo_dir));
            write_json(&path, repository)
        }
        MonorepoMode::Separate => {
            let dir = args.output.clone().unwrap_or_else(|| PathBuf::from("output"));
            std::fs::create_dir_all(&dir).map_err(|e| IndexError::PackageLoadFailed {
                pkg_path: dir.display().to_string(),
                underlying: e.to_string(),
            })?;
            for (name, module) in &repository.modules {
                let mut single = Repository::new(repository.id.clone(), repository.path.clone());
                single.modules.insert(name.clone(), module.clone());
                let filename = format!("{}.json", workdist::sanitize_filename(name));
                write_json(&dir.join(filename), &single)?;
            }
            Ok(())
        }
    }
}

fn default_output_path(repo_dir: &Path) -> PathBuf {
    let repo_name = repo_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "repo".to_string());
    PathBuf::from("output").join(format!("{repo_name}.json"))
}

fn write_json(path: &Path, value: &Repository) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| IndexError::PackageLoadFailed {
        pkg_path: path.display().to_string(),
        underlying: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|e| IndexError::PackageLoadFailed {
        pkg_path: path.display().to_string(),
        underlying: e.to_string(),
    })
}
