use wgpu::naga;

fn parse_and_validate(source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| err.emit_to_string(source))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );

    validator
        .validate(&module)
        .map_err(|err| err.emit_to_string(source))?;
    Ok(module)
}

const PARTICLES_WGSL: &str = include_str!("../src/shaders/particles.wgsl");

#[test]
fn particles_shader_is_valid_wgsl() {
    parse_and_validate(PARTICLES_WGSL).unwrap();
}

#[test]
fn particles_shader_exposes_pipeline_entry_points() {
    let module = parse_and_validate(PARTICLES_WGSL).unwrap();
    let names: Vec<&str> = module
        .entry_points
        .iter()
        .map(|entry| entry.name.as_str())
        .collect();
    assert!(names.contains(&"vs_main"));
    assert!(names.contains(&"fs_main"));
}

#[test]
fn particles_shader_reads_seven_instance_attributes() {
    let module = parse_and_validate(PARTICLES_WGSL).unwrap();
    let vertex = module
        .entry_points
        .iter()
        .find(|entry| entry.name == "vs_main")
        .expect("vertex entry point");

    let mut locations = Vec::new();
    for argument in &vertex.function.arguments {
        let ty = &module.types[argument.ty];
        if let naga::TypeInner::Struct { members, .. } = &ty.inner {
            for member in members {
                if let Some(naga::Binding::Location { location, .. }) = member.binding {
                    locations.push(location);
                }
            }
        }
    }
    locations.sort_unstable();
    assert_eq!(locations, (0..7).collect::<Vec<u32>>());
}
