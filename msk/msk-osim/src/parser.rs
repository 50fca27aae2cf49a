//! Model descriptor XML parser.
//!
//! Parses `OpenSimDocument/Model` (or a bare `Model` root) into the
//! intermediate representation types. Only `BodySet`, `JointSet` and
//! `ForceSet` are read; every other subtree is skipped.

use std::fs;
use std::io::BufRead;
use std::path::Path;

use nalgebra::Vector3;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info, warn};

use crate::error::{OsimError, Result};
use crate::types::{
    AxisFunction, BodyDescriptor, CoordinateDescriptor, ForceElement, JointDescriptor, JointKind,
    ModelDescriptor, MotionType, OffsetFrame, PathPointDescriptor, TransformAxis,
};

/// Load and parse a model descriptor file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid model.
pub fn load_osim_file<P: AsRef<Path>>(path: P) -> Result<ModelDescriptor> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OsimError::FileNotFound(path.to_path_buf())
        } else {
            OsimError::Io(e)
        }
    })?;
    let model = parse_osim_str(&xml)?;
    info!(
        path = %path.display(),
        model = %model.name,
        bodies = model.bodies.len(),
        joints = model.joints.len(),
        forces = model.forces.len(),
        "Loaded model descriptor"
    );
    Ok(model)
}

/// Parse a model descriptor from an XML string.
///
/// # Errors
///
/// Returns an error if the XML is malformed or missing required elements.
pub fn parse_osim_str(xml: &str) -> Result<ModelDescriptor> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    parse_osim_reader(&mut reader)
}

fn parse_osim_reader<R: BufRead>(reader: &mut Reader<R>) -> Result<ModelDescriptor> {
    let mut buf = Vec::new();
    let mut model: Option<ModelDescriptor> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Model" => model = Some(parse_model(reader, e)?),
                // Descend into the document wrapper
                b"OpenSimDocument" => {}
                other => {
                    let other = other.to_vec();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Model" => {
                model = Some(ModelDescriptor::new(
                    get_attribute_opt(e, "name").unwrap_or_default(),
                ));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    model.ok_or_else(|| OsimError::missing_element("Model", "model document"))
}

/// Parse the `Model` element and its sets.
fn parse_model<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<ModelDescriptor> {
    let mut model = ModelDescriptor::new(get_attribute_opt(start, "name").unwrap_or_default());
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"BodySet" => model.bodies.extend(parse_body_set(reader)?),
                    b"JointSet" => model.joints.extend(parse_joint_set(reader)?),
                    b"ForceSet" => model.forces.extend(parse_force_set(reader)?),
                    // Ground, ConstraintSet, MarkerSet, ContactGeometrySet, ...
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Model" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("Model")),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(model)
}

// ============================================================================
// Sets
// ============================================================================

/// Visit every child of `<Set><objects>...</objects></Set>`.
///
/// `visit` receives `true` for self-closing children; otherwise it must
/// consume the child up to and including its end tag.
fn for_each_object<R, F>(reader: &mut Reader<R>, set: &[u8], mut visit: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&mut Reader<R>, &BytesStart, bool) -> Result<()>,
{
    let mut buf = Vec::new();
    let mut in_objects = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if in_objects {
                    visit(reader, e, false)?;
                } else if e.name().as_ref() == b"objects" {
                    in_objects = true;
                } else {
                    let elem_name = e.name().as_ref().to_vec();
                    skip_element(reader, &elem_name)?;
                }
            }
            Ok(Event::Empty(ref e)) if in_objects => visit(reader, e, true)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"objects" => in_objects = false,
            Ok(Event::End(ref e)) if e.name().as_ref() == set => break,
            Ok(Event::Eof) => {
                return Err(unexpected_eof(&String::from_utf8_lossy(set)));
            }
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

fn parse_body_set<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<BodyDescriptor>> {
    let mut bodies = Vec::new();
    for_each_object(reader, b"BodySet", |reader, e, empty| {
        if e.name().as_ref() == b"Body" {
            bodies.push(parse_body(reader, e, empty)?);
        } else if !empty {
            let elem_name = e.name().as_ref().to_vec();
            skip_element(reader, &elem_name)?;
        }
        Ok(())
    })?;
    Ok(bodies)
}

fn parse_joint_set<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<JointDescriptor>> {
    let mut joints = Vec::new();
    for_each_object(reader, b"JointSet", |reader, e, empty| {
        joints.push(parse_joint(reader, e, empty)?);
        Ok(())
    })?;
    Ok(joints)
}

fn parse_force_set<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<ForceElement>> {
    let mut forces = Vec::new();
    for_each_object(reader, b"ForceSet", |reader, e, empty| {
        forces.push(parse_force(reader, e, empty)?);
        Ok(())
    })?;
    Ok(forces)
}

// ============================================================================
// Bodies
// ============================================================================

fn parse_body<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    empty: bool,
) -> Result<BodyDescriptor> {
    let name = get_attribute(start, "name")?;
    let mut body = BodyDescriptor::new(name, 0.0);
    if empty {
        return Ok(body);
    }

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"mass" => {
                        let text = read_text(reader, b"mass")?;
                        body.mass = parse_f64(&text, "mass", &body.name)?;
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Body" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("Body")),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(body)
}

// ============================================================================
// Joints
// ============================================================================

/// A coordinate before its motion type is resolved against the joint.
struct RawCoordinate {
    name: String,
    motion_type: Option<MotionType>,
    default_value: f64,
}

fn parse_joint<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    empty: bool,
) -> Result<JointDescriptor> {
    let tag = start.name().as_ref().to_vec();
    let kind = JointKind::from_tag(&String::from_utf8_lossy(&tag));
    let name = get_attribute_opt(start, "name").unwrap_or_else(|| "Unnamed Joint".to_string());
    let context = format!("joint '{name}'");

    let mut parent_frame: Option<String> = None;
    let mut child_frame: Option<String> = None;
    let mut coordinates = Vec::new();
    let mut frames = Vec::new();
    let mut transform_axes = Vec::new();

    let mut buf = Vec::new();
    while !empty {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"socket_parent_frame" => {
                        parent_frame = Some(read_text(reader, &elem_name)?);
                    }
                    b"socket_child_frame" => {
                        child_frame = Some(read_text(reader, &elem_name)?);
                    }
                    b"coordinates" => coordinates = parse_coordinates(reader)?,
                    b"frames" => frames = parse_frames(reader)?,
                    b"SpatialTransform" => transform_axes = parse_spatial_transform(reader)?,
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == tag.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&context)),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let parent_frame = parent_frame
        .ok_or_else(|| OsimError::missing_element("socket_parent_frame", context.clone()))?;
    let child_frame =
        child_frame.ok_or_else(|| OsimError::missing_element("socket_child_frame", context))?;

    let mut joint = JointDescriptor::new(name, kind, parent_frame, child_frame);
    joint.frames = frames;
    joint.transform_axes = transform_axes;
    joint.coordinates = coordinates
        .into_iter()
        .map(|raw| {
            let motion_type = raw
                .motion_type
                .unwrap_or_else(|| infer_motion_type(&joint, &raw.name));
            CoordinateDescriptor::new(raw.name)
                .with_motion_type(motion_type)
                .with_default(raw.default_value)
        })
        .collect();

    if let JointKind::Other(tag) = &joint.kind {
        debug!(joint = %joint.name, tag = %tag, "Joint kind is not driven by the kinematic engine");
    }
    Ok(joint)
}

/// Motion type implied by the joint kind and its transform axes.
fn infer_motion_type(joint: &JointDescriptor, coordinate: &str) -> MotionType {
    match joint.kind {
        JointKind::Slider => MotionType::Translational,
        JointKind::Custom => {
            let driven: Vec<&TransformAxis> = joint
                .transform_axes
                .iter()
                .filter(|a| a.coordinates.iter().any(|c| c == coordinate))
                .collect();
            let rotates = driven.iter().any(|a| a.is_rotation());
            let translates = driven.iter().any(|a| !a.is_rotation());
            match (rotates, translates) {
                (true, true) => MotionType::Coupled,
                (false, true) => MotionType::Translational,
                _ => MotionType::Rotational,
            }
        }
        _ => MotionType::Rotational,
    }
}

fn parse_coordinates<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<RawCoordinate>> {
    let mut coordinates = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Coordinate" => {
                coordinates.push(parse_coordinate(reader, e)?);
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Coordinate" => {
                coordinates.push(RawCoordinate {
                    name: get_attribute(e, "name")?,
                    motion_type: None,
                    default_value: 0.0,
                });
            }
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                skip_element(reader, &elem_name)?;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"coordinates" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("coordinates")),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(coordinates)
}

fn parse_coordinate<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
) -> Result<RawCoordinate> {
    let name = get_attribute(start, "name")?;
    let context = format!("coordinate '{name}'");
    let mut coordinate = RawCoordinate {
        name,
        motion_type: None,
        default_value: 0.0,
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"default_value" => {
                        let text = read_text(reader, &elem_name)?;
                        coordinate.default_value = parse_f64(&text, "default_value", &context)?;
                    }
                    b"motion_type" => {
                        let text = read_text(reader, &elem_name)?;
                        coordinate.motion_type = Some(parse_motion_type(&text, &context)?);
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Coordinate" => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&context)),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(coordinate)
}

fn parse_motion_type(text: &str, context: &str) -> Result<MotionType> {
    match text.to_ascii_lowercase().as_str() {
        "rotational" => Ok(MotionType::Rotational),
        "translational" => Ok(MotionType::Translational),
        "coupled" => Ok(MotionType::Coupled),
        other => Err(OsimError::invalid_value(
            "motion_type",
            context,
            format!("unknown motion type `{other}`"),
        )),
    }
}

fn parse_frames<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<OffsetFrame>> {
    let mut frames = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => frames.push(parse_offset_frame(reader, e)?),
            Ok(Event::End(ref e)) if e.name().as_ref() == b"frames" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("frames")),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(frames)
}

fn parse_offset_frame<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
) -> Result<OffsetFrame> {
    let tag = start.name().as_ref().to_vec();
    let name = get_attribute(start, "name")?;
    let context = format!("frame '{name}'");
    let mut parent: Option<String> = None;
    let mut translation = Vector3::zeros();
    let mut orientation = Vector3::zeros();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"socket_parent" => parent = Some(read_text(reader, &elem_name)?),
                    b"translation" => {
                        translation =
                            parse_vector3(&read_text(reader, &elem_name)?, "translation", &context)?;
                    }
                    b"orientation" => {
                        orientation =
                            parse_vector3(&read_text(reader, &elem_name)?, "orientation", &context)?;
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == tag.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&context)),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let parent = parent.ok_or_else(|| OsimError::missing_element("socket_parent", context))?;
    Ok(OffsetFrame::new(name, parent)
        .with_translation(translation)
        .with_orientation(orientation))
}

fn parse_spatial_transform<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<TransformAxis>> {
    let mut axes = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"TransformAxis" => {
                axes.push(parse_transform_axis(reader, e)?);
            }
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                skip_element(reader, &elem_name)?;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"SpatialTransform" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("SpatialTransform")),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(axes)
}

fn parse_transform_axis<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
) -> Result<TransformAxis> {
    let name = get_attribute(start, "name")?;
    let context = format!("transform axis '{name}'");
    let mut coordinates = Vec::new();
    let mut axis = Vector3::zeros();
    let mut function: Option<AxisFunction> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"coordinates" => {
                        coordinates = read_text(reader, &elem_name)?
                            .split_whitespace()
                            .map(str::to_string)
                            .collect();
                    }
                    b"axis" => {
                        axis = parse_vector3(&read_text(reader, &elem_name)?, "axis", &context)?;
                    }
                    b"LinearFunction" => function = Some(parse_linear_function(reader, &context)?),
                    b"Constant" => function = Some(parse_constant(reader, &context)?),
                    other => {
                        let tag = String::from_utf8_lossy(other).to_string();
                        warn!(axis = %name, function = %tag, "Unsupported transform function, treated as identity");
                        function = Some(AxisFunction::Unsupported(tag));
                        skip_element(reader, &elem_name)?;
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"TransformAxis" => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&context)),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let function = function.unwrap_or_else(|| {
        if coordinates.is_empty() {
            AxisFunction::Constant(0.0)
        } else {
            AxisFunction::identity()
        }
    });

    Ok(TransformAxis {
        name,
        coordinates,
        axis,
        function,
    })
}

fn parse_linear_function<R: BufRead>(
    reader: &mut Reader<R>,
    context: &str,
) -> Result<AxisFunction> {
    let mut function = AxisFunction::identity();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                if elem_name == b"coefficients" {
                    let values = parse_floats(&read_text(reader, &elem_name)?, "coefficients", context)?;
                    function = match values.as_slice() {
                        [slope, intercept] => AxisFunction::Linear {
                            slope: *slope,
                            intercept: *intercept,
                        },
                        _ => {
                            return Err(OsimError::invalid_value(
                                "coefficients",
                                context,
                                format!("expected 2 values, got {}", values.len()),
                            ));
                        }
                    };
                } else {
                    skip_element(reader, &elem_name)?;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"LinearFunction" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("LinearFunction")),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(function)
}

fn parse_constant<R: BufRead>(reader: &mut Reader<R>, context: &str) -> Result<AxisFunction> {
    let mut value = 0.0;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                if elem_name == b"value" {
                    value = parse_f64(&read_text(reader, &elem_name)?, "value", context)?;
                } else {
                    skip_element(reader, &elem_name)?;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Constant" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("Constant")),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(AxisFunction::Constant(value))
}

// ============================================================================
// Forces
// ============================================================================

fn parse_force<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    empty: bool,
) -> Result<ForceElement> {
    let tag = start.name().as_ref().to_vec();
    let name = get_attribute(start, "name")?;
    let mut force = ForceElement::new(name, String::from_utf8_lossy(&tag));

    let mut buf = Vec::new();
    while !empty {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"GeometryPath" => force.path_points = parse_geometry_path(reader, &force.name)?,
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == tag.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&force.name)),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(force)
}

fn parse_geometry_path<R: BufRead>(
    reader: &mut Reader<R>,
    force: &str,
) -> Result<Vec<PathPointDescriptor>> {
    let mut points = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                if elem_name == b"PathPointSet" {
                    for_each_object(reader, b"PathPointSet", |reader, e, empty| {
                        if empty {
                            warn!(force, point = ?get_attribute_opt(e, "name"), "Path point without location skipped");
                        } else {
                            points.push(parse_path_point(reader, e, force)?);
                        }
                        Ok(())
                    })?;
                } else {
                    skip_element(reader, &elem_name)?;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"GeometryPath" => break,
            Ok(Event::Eof) => return Err(unexpected_eof("GeometryPath")),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(points)
}

fn parse_path_point<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    force: &str,
) -> Result<PathPointDescriptor> {
    let tag = start.name().as_ref().to_vec();
    let name = get_attribute_opt(start, "name").unwrap_or_default();
    let context = format!("path point '{name}' of '{force}'");
    let mut frame: Option<String> = None;
    let mut location: Option<Vector3<f64>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"socket_parent_frame" => frame = Some(read_text(reader, &elem_name)?),
                    // Pre-4.0 documents name the body directly
                    b"body" => {
                        frame = Some(format!("/bodyset/{}", read_text(reader, &elem_name)?));
                    }
                    b"location" => {
                        location = Some(parse_vector3(
                            &read_text(reader, &elem_name)?,
                            "location",
                            &context,
                        )?);
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == tag.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&context)),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let frame = frame.ok_or_else(|| OsimError::missing_element("socket_parent_frame", context.clone()))?;
    let location = location.unwrap_or_else(|| {
        warn!(point = %name, force, "Path point has no fixed location, using frame origin");
        Vector3::zeros()
    });
    Ok(PathPointDescriptor::new(name, frame, location))
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get a required attribute value.
fn get_attribute(e: &BytesStart, name: &'static str) -> Result<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec()).map_err(|_| {
                OsimError::invalid_value(name, element_name(e), "invalid UTF-8")
            });
        }
    }
    Err(OsimError::missing_element(name, element_name(e)))
}

/// Get an optional attribute value.
fn get_attribute_opt(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name.as_bytes())
        .and_then(|attr| String::from_utf8(attr.value.to_vec()).ok())
}

/// Read the text content of the current element up to its end tag.
fn read_text<R: BufRead>(reader: &mut Reader<R>, tag: &[u8]) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(t)) => {
                let unescaped = t.unescape().map_err(|e| OsimError::XmlParse(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                skip_element(reader, &elem_name)?;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == tag => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&String::from_utf8_lossy(tag))),
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

fn parse_f64(text: &str, field: &'static str, context: &str) -> Result<f64> {
    text.trim()
        .parse()
        .map_err(|_| OsimError::invalid_value(field, context, format!("expected a number, got `{text}`")))
}

fn parse_floats(text: &str, field: &'static str, context: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|p| parse_f64(p, field, context))
        .collect()
}

/// Parse a space-separated vector3 string.
fn parse_vector3(text: &str, field: &'static str, context: &str) -> Result<Vector3<f64>> {
    let parts = parse_floats(text, field, context)?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(OsimError::invalid_value(
            field,
            context,
            format!("expected 3 values, got {}", parts.len()),
        )),
    }
}

/// Get element name as string for error messages.
fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn unexpected_eof(context: &str) -> OsimError {
    OsimError::XmlParse(format!("unexpected EOF in {context}"))
}

/// Skip an element and all its children.
fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => depth += 1,
            Ok(Event::End(ref e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(OsimError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LEG: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<OpenSimDocument Version="40000">
  <Model name="leg">
    <Ground name="ground"><FrameGeometry name="frame_geometry"/></Ground>
    <BodySet name="bodyset">
      <objects>
        <Body name="femur"><mass>1.5</mass></Body>
        <Body name="tibia"><mass>0.75</mass></Body>
      </objects>
      <groups />
    </BodySet>
    <JointSet name="jointset">
      <objects>
        <WeldJoint name="ground_femur">
          <socket_parent_frame>/ground</socket_parent_frame>
          <socket_child_frame>femur</socket_child_frame>
        </WeldJoint>
        <PinJoint name="knee">
          <socket_parent_frame>femur_offset</socket_parent_frame>
          <socket_child_frame>tibia_offset</socket_child_frame>
          <coordinates>
            <Coordinate name="knee_flexion">
              <default_value>0.25</default_value>
              <range>-2 0.5</range>
            </Coordinate>
          </coordinates>
          <frames>
            <PhysicalOffsetFrame name="femur_offset">
              <socket_parent>/bodyset/femur</socket_parent>
              <translation>0 -0.4 0</translation>
              <orientation>0 0 0</orientation>
            </PhysicalOffsetFrame>
            <PhysicalOffsetFrame name="tibia_offset">
              <socket_parent>/bodyset/tibia</socket_parent>
              <translation>0 0 0</translation>
              <orientation>0 0 0</orientation>
            </PhysicalOffsetFrame>
          </frames>
        </PinJoint>
        <CustomJoint name="ankle">
          <socket_parent_frame>/bodyset/tibia</socket_parent_frame>
          <socket_child_frame>/bodyset/tibia</socket_child_frame>
          <coordinates>
            <Coordinate name="ankle_flexion" />
            <Coordinate name="ankle_slide" />
          </coordinates>
          <SpatialTransform>
            <TransformAxis name="rotation1">
              <coordinates>ankle_flexion</coordinates>
              <axis>0 0 1</axis>
              <LinearFunction name="function"><coefficients>2 0.1</coefficients></LinearFunction>
            </TransformAxis>
            <TransformAxis name="translation1">
              <coordinates>ankle_slide</coordinates>
              <axis>1 0 0</axis>
              <SimmSpline name="function"><x>0 1</x><y>0 1</y></SimmSpline>
            </TransformAxis>
            <TransformAxis name="translation2">
              <coordinates></coordinates>
              <axis>0 1 0</axis>
              <Constant name="function"><value>0.05</value></Constant>
            </TransformAxis>
          </SpatialTransform>
        </CustomJoint>
      </objects>
    </JointSet>
    <ForceSet name="forceset">
      <objects>
        <DeGrooteFregly2016Muscle name="vasti">
          <GeometryPath name="path">
            <PathPointSet>
              <objects>
                <PathPoint name="vasti-P1">
                  <socket_parent_frame>/bodyset/femur</socket_parent_frame>
                  <location>0.02 -0.1 0</location>
                </PathPoint>
                <ConditionalPathPoint name="vasti-P2">
                  <socket_parent_frame>/bodyset/femur</socket_parent_frame>
                  <location>0.03 -0.38 0</location>
                  <range>-2 0</range>
                </ConditionalPathPoint>
                <PathPoint name="vasti-P3">
                  <socket_parent_frame>/bodyset/tibia</socket_parent_frame>
                  <location>0.04 -0.05 0</location>
                </PathPoint>
              </objects>
            </PathPointSet>
            <PathWrapSet><objects /></PathWrapSet>
          </GeometryPath>
          <max_isometric_force>3000</max_isometric_force>
        </DeGrooteFregly2016Muscle>
        <CoordinateActuator name="knee_reserve">
          <coordinate>knee_flexion</coordinate>
        </CoordinateActuator>
      </objects>
    </ForceSet>
  </Model>
</OpenSimDocument>
"#;

    #[test]
    fn parses_bodies_joints_and_forces() {
        let model = parse_osim_str(LEG).expect("should parse");
        assert_eq!(model.name, "leg");
        assert_eq!(model.bodies.len(), 2);
        assert_relative_eq!(model.body("femur").unwrap().mass, 1.5);
        assert_eq!(model.joints.len(), 3);
        assert_eq!(model.forces.len(), 2);
        assert_eq!(model.forces[1].tag, "CoordinateActuator");
    }

    #[test]
    fn parses_pin_joint_frames_and_coordinates() {
        let model = parse_osim_str(LEG).unwrap();
        let knee = model.joint("knee").unwrap();
        assert_eq!(knee.kind, JointKind::Pin);
        assert_eq!(knee.parent_frame, "femur_offset");
        assert_eq!(knee.coordinates.len(), 1);
        assert_relative_eq!(knee.coordinates[0].default_value, 0.25);
        assert_eq!(knee.coordinates[0].motion_type, MotionType::Rotational);

        let offset = knee.frame("femur_offset").unwrap();
        assert_eq!(offset.parent, "/bodyset/femur");
        assert_relative_eq!(offset.translation.y, -0.4);
    }

    #[test]
    fn parses_spatial_transform_functions() {
        let model = parse_osim_str(LEG).unwrap();
        let ankle = model.joint("ankle").unwrap();
        assert_eq!(ankle.transform_axes.len(), 3);
        assert_eq!(
            ankle.transform_axes[0].function,
            AxisFunction::Linear {
                slope: 2.0,
                intercept: 0.1
            }
        );
        assert_eq!(
            ankle.transform_axes[1].function,
            AxisFunction::Unsupported("SimmSpline".into())
        );
        assert_eq!(ankle.transform_axes[2].function, AxisFunction::Constant(0.05));
        assert!(ankle.transform_axes[2].coordinates.is_empty());

        assert_eq!(ankle.coordinates[0].motion_type, MotionType::Rotational);
        assert_eq!(ankle.coordinates[1].motion_type, MotionType::Translational);
    }

    #[test]
    fn parses_path_points_in_routing_order() {
        let model = parse_osim_str(LEG).unwrap();
        let vasti = model.force("vasti").unwrap();
        let names: Vec<&str> = vasti.path_points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["vasti-P1", "vasti-P2", "vasti-P3"]);
        assert_eq!(vasti.path_points[2].frame, "/bodyset/tibia");
        assert_relative_eq!(vasti.path_points[1].location.y, -0.38);
    }

    #[test]
    fn accepts_bare_model_root() {
        let xml = r#"<Model name="bare"><ForceSet><objects>
            <DeGrooteFregly2016Muscle name="m"/>
        </objects></ForceSet></Model>"#;
        let model = parse_osim_str(xml).unwrap();
        assert_eq!(model.name, "bare");
        assert_eq!(model.forces[0].name, "m");
        assert!(model.forces[0].path_points.is_empty());
    }

    #[test]
    fn legacy_body_reference_becomes_frame_path() {
        let xml = r#"<Model name="old"><ForceSet><objects>
            <Thelen2003Muscle name="m"><GeometryPath><PathPointSet><objects>
              <PathPoint name="p"><location>1 2 3</location><body>pelvis</body></PathPoint>
            </objects></PathPointSet></GeometryPath></Thelen2003Muscle>
        </objects></ForceSet></Model>"#;
        let model = parse_osim_str(xml).unwrap();
        assert_eq!(model.forces[0].path_points[0].frame, "/bodyset/pelvis");
    }

    #[test]
    fn missing_model_is_an_error() {
        let err = parse_osim_str("<OpenSimDocument/>").unwrap_err();
        assert!(matches!(err, OsimError::MissingElement { element: "Model", .. }));
    }

    #[test]
    fn joint_without_parent_frame_is_an_error() {
        let xml = r#"<Model name="m"><JointSet><objects>
            <PinJoint name="j"><socket_child_frame>b</socket_child_frame></PinJoint>
        </objects></JointSet></Model>"#;
        let err = parse_osim_str(xml).unwrap_err();
        assert!(matches!(
            err,
            OsimError::MissingElement {
                element: "socket_parent_frame",
                ..
            }
        ));
    }

    #[test]
    fn bad_vector_reports_field() {
        let xml = r#"<Model name="m"><ForceSet><objects>
            <DeGrooteFregly2016Muscle name="m1"><GeometryPath><PathPointSet><objects>
              <PathPoint name="p"><socket_parent_frame>/ground</socket_parent_frame><location>1 2</location></PathPoint>
            </objects></PathPointSet></GeometryPath></DeGrooteFregly2016Muscle>
        </objects></ForceSet></Model>"#;
        let err = parse_osim_str(xml).unwrap_err();
        assert!(matches!(err, OsimError::InvalidValue { field: "location", .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_osim_file("/nonexistent/model.osim").unwrap_err();
        assert!(matches!(err, OsimError::FileNotFound(_)));
    }
}
