use serde_yaml::Value;

use crate::catalog::EnumCatalog;
use crate::domain::{Code, Trackable, ValidationError};
use crate::package::{Package, PrimaryObject};

/// Run the full rule battery against a loaded package. Every rule is
/// evaluated, nothing short-circuits: a package with three invalid coded
/// fields collects three errors. Base sample rules always run first, then
/// the kind-specific rules append to the same list.
pub fn validate(package: &mut Package, catalog: &EnumCatalog) {
    let mut errors = sample_rules(package, catalog);
    match &package.primary {
        PrimaryObject::Analysis(_) => errors.extend(analysis_rules(package, catalog)),
        PrimaryObject::Sequencing { .. } => errors.extend(sequencing_rules(package, catalog)),
    }
    package.local_errors.extend(errors);
}

fn sample_rules(package: &Package, catalog: &EnumCatalog) -> Vec<ValidationError> {
    let sample = &package.sample;
    let mut errors = Vec::new();
    let mut push = |field: &str, message: String| {
        errors.push(ValidationError {
            object_type: "sample".to_string(),
            object_alias: sample.alias.clone(),
            field: field.to_string(),
            message,
        });
    };

    if sample.alias != package.directory_name() {
        push(
            "alias",
            format!(
                "Invalid value '{}'. Sample's alias must be set and match the package directory name '{}'.",
                sample.alias,
                package.directory_name()
            ),
        );
    }

    if sample.subject_id.is_empty() {
        push(
            "subjectId",
            "Invalid value, sample's subjectId must be set.".to_string(),
        );
    }

    if sample.phenotype.is_empty() {
        push(
            "phenotype",
            "Invalid value, sample's phenotype must be set.".to_string(),
        );
    }

    if !valid_code(catalog, "genders", &sample.gender_id) {
        push(
            "gender",
            format!("Invalid value '{}'", code_display(&sample.gender_id)),
        );
    }

    if !valid_code(catalog, "case_control", &sample.case_or_control_id) {
        push(
            "caseOrControl",
            format!("Invalid value '{}'", code_display(&sample.case_or_control_id)),
        );
    }

    errors
}

fn analysis_rules(package: &Package, catalog: &EnumCatalog) -> Vec<ValidationError> {
    let PrimaryObject::Analysis(analysis) = &package.primary else {
        return Vec::new();
    };
    let mut errors = Vec::new();
    let mut push = |field: &str, message: String| {
        errors.push(ValidationError {
            object_type: "analysis".to_string(),
            object_alias: analysis.alias().to_string(),
            field: field.to_string(),
            message,
        });
    };

    if !valid_code(catalog, "reference_genomes", &analysis.genome_id) {
        push(
            "referenceGenomes",
            format!("Invalid value '{}'", code_display(&analysis.genome_id)),
        );
    }

    match analysis.experiment_type_id.as_sequence() {
        None => push(
            "experimentTypes",
            "Invalid value: experimentTypeId must be a list.".to_string(),
        ),
        Some(elements) => {
            for element in elements {
                let code = scalar_code(element);
                if !valid_code(catalog, "experiment_types", &code) {
                    push(
                        "experimentTypes",
                        format!(
                            "Invalid value '{}' in experimentTypeId",
                            code_display(&code)
                        ),
                    );
                }
            }
        }
    }

    match analysis.chromosome_references.as_sequence() {
        None => push(
            "chromosomeReferences",
            "Invalid value: chromosomeReferences must be a list.".to_string(),
        ),
        Some(elements) => {
            for element in elements {
                // Chromosome entries may be plain codes or `{value, label}` maps.
                let code = scalar_code(element.get("value").unwrap_or(element));
                if !valid_code(catalog, "reference_chromosomes", &code) {
                    push(
                        "chromosomeReferences",
                        format!(
                            "Invalid value '{}' in chromosomeReferences",
                            code_display(&code)
                        ),
                    );
                }
            }
        }
    }

    errors
}

fn sequencing_rules(package: &Package, catalog: &EnumCatalog) -> Vec<ValidationError> {
    let PrimaryObject::Sequencing { experiment, run } = &package.primary else {
        return Vec::new();
    };
    let mut errors = Vec::new();

    let experiment_checks = [
        ("instrumentModel", "instrument_models", &experiment.instrument_model_id),
        ("librarySource", "library_sources", &experiment.library_source_id),
        ("librarySelection", "library_selections", &experiment.library_selection_id),
        ("libraryStrategy", "library_strategies", &experiment.library_strategy_id),
        ("libraryLayout", "library_layouts", &experiment.library_layout_id),
    ];
    for (field, category, code) in experiment_checks {
        if !valid_code(catalog, category, code) {
            errors.push(ValidationError {
                object_type: "experiment".to_string(),
                object_alias: experiment.alias().to_string(),
                field: field.to_string(),
                message: format!("Invalid value '{}'", code_display(code)),
            });
        }
    }

    if !valid_code(catalog, "file_types", &run.run_file_type_id) {
        errors.push(ValidationError {
            object_type: "run".to_string(),
            object_alias: run.alias().to_string(),
            field: "runFileType".to_string(),
            message: format!("Invalid value '{}'", code_display(&run.run_file_type_id)),
        });
    }

    errors
}

fn valid_code(catalog: &EnumCatalog, category: &str, code: &Option<Code>) -> bool {
    code.as_ref()
        .is_some_and(|code| catalog.contains_tag(category, code))
}

fn code_display(code: &Option<Code>) -> String {
    code.as_ref()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string())
}

fn scalar_code(value: &Value) -> Option<Code> {
    match value {
        Value::String(text) => Some(Code::from(text.as_str())),
        Value::Number(number) => Some(Code::from(number.to_string().as_str())),
        Value::Bool(flag) => Some(Code::from(flag.to_string().as_str())),
        _ => None,
    }
}
